//! In-process channels built from [crossbeam] pipes, for running both parties in one process.

use scuttlebutt::{SyncChannel, TrackChannel};
use std::time::Duration;

pub mod crossbeam_wrapper;
pub use crossbeam_wrapper::{cbch_pair, CrossbeamReceiver, CrossbeamSender};

/// Channel over a pair of crossbeam pipes.
pub type CrossbeamChannel = SyncChannel<CrossbeamReceiver, CrossbeamSender>;

/// Traffic-counting channel over a pair of crossbeam pipes.
pub type CrossbeamTrackChannel = TrackChannel<CrossbeamReceiver, CrossbeamSender>;

/// Reading and writing halves of one party's end.
pub type CrossbeamEnd = (CrossbeamReceiver, CrossbeamSender);

/// Two connected ends.
pub fn create_crossbeam_end_pair(timeout: Duration) -> (CrossbeamEnd, CrossbeamEnd) {
    let (sr, rl) = cbch_pair(timeout);
    let (sl, rr) = cbch_pair(timeout);
    ((rl, sl), (rr, sr))
}

/// Two connected channels.
pub fn create_crossbeam_channel_pair(timeout: Duration) -> (CrossbeamChannel, CrossbeamChannel) {
    let ((rl, sl), (rr, sr)) = create_crossbeam_end_pair(timeout);
    (SyncChannel::new(rl, sl), SyncChannel::new(rr, sr))
}
