use super::{PsiReceiver, PsiSender};
use crate::cli_utils::{create_channel_ends, create_vole_sr, Args, ChannelEnd};
use crate::okvs::{HashSeed, OkvsMode, OkvsParams};
use crate::parallel::{ParallelConfig, WorkerPool};
use crate::set_utils::create_sets_with_common;
use anyhow::{anyhow, ensure, Context, Result};
use scuttlebutt::AesRng;
use std::collections::HashSet;
use std::time::Instant;

fn intersection_prepare(
    rng: &mut AesRng,
    set_size: usize,
    common_size: usize,
) -> Result<(Vec<u128>, Vec<u128>, Vec<u128>)> {
    let res = create_sets_with_common(set_size, common_size, rng)
        .with_context(|| "Failed to create sets.")?;

    println!("intersection prepared.");

    Ok(res)
}

#[allow(clippy::too_many_arguments)]
fn protocol_base(
    intersection: Vec<u128>,
    sender_set: Vec<u128>,
    receiver_set: Vec<u128>,
    sender_end: ChannelEnd,
    receiver_end: ChannelEnd,
    params: OkvsParams,
    mode: OkvsMode,
    args: &Args,
) -> Result<()> {
    let config = ParallelConfig::new(args.threads);
    let (vole_s, vole_r) = create_vole_sr(args.vole_type, params.m());

    let sender_pool = WorkerPool::new(&config).with_context(|| "Failed to build sender pool.")?;
    let handle = std::thread::spawn(move || -> Result<f64> {
        let mut rng = AesRng::new();
        let mut channel = sender_end
            .open()
            .with_context(|| "Failed to open sender channel.")?;

        println!("sender prepared.");

        let mut sender = PsiSender::new(sender_pool, vole_s);
        sender
            .send(&mut channel, &sender_set, &mut rng)
            .with_context(|| "Failed to run sender.")?;

        println!("sender finished.");

        Ok(channel.kilobytes_written())
    });

    let mut rng = AesRng::new();
    let mut channel = receiver_end
        .open()
        .with_context(|| "Failed to open receiver channel.")?;
    let receiver_pool =
        WorkerPool::new(&config).with_context(|| "Failed to build receiver pool.")?;
    let mut receiver = PsiReceiver::new(
        params,
        mode,
        HashSeed::random(&mut rng),
        receiver_pool,
        vole_r,
    )
    .with_context(|| "Failed to create receiver.")?;

    println!("receiver prepared.");

    let start = Instant::now();
    let res = receiver
        .receive(&mut channel, &receiver_set, &mut rng)
        .with_context(|| "Failed to run receiver.")?;
    let elapsed = start.elapsed();

    println!("receiver finished.");

    let sender_kb = handle
        .join()
        .map_err(|_| anyhow!("Failed to join the sender thread."))??;

    println!("time: {:?}", elapsed);
    println!(
        "traffic: receiver -> sender {:.2} KB, sender -> receiver {:.2} KB",
        channel.kilobytes_written(),
        sender_kb
    );

    if args.verbose {
        println!("intersection: {:?}", res);
    }

    let res: HashSet<u128> = HashSet::from_iter(res);
    let intersection: HashSet<u128> = HashSet::from_iter(intersection);

    ensure!(
        res == intersection,
        "intersection mismatch: got {} items, expected {}",
        res.len(),
        intersection.len()
    );

    println!("intersection size: {}", res.len());

    Ok(())
}

/// Run both parties in this process and check the output against the generated intersection.
pub fn run(args: Args) -> Result<()> {
    let mut rng = AesRng::new();

    // create sets
    let (intersection, sender_set, receiver_set) =
        intersection_prepare(&mut rng, args.set_size, args.common_size)
            .with_context(|| "Failed to prepare intersection.")?;

    println!("sets prepared.");

    let params = OkvsParams::new(args.set_size, args.band_width, args.expansion)
        .with_context(|| "Invalid OKVS parameters.")?;
    let mode = OkvsMode::from(args.okvs_mode);

    // create channels
    let (sender_end, receiver_end) =
        create_channel_ends(args.channel_type, args.port, args.timeout())
            .with_context(|| "Failed to create channels.")?;

    println!("channels prepared.");

    protocol_base(
        intersection,
        sender_set,
        receiver_set,
        sender_end,
        receiver_end,
        params,
        mode,
        &args,
    )?;

    Ok(())
}
