//! Shoebox Scene Integration Tests
//!
//! End-to-end checks of the scene manager:
//! - Image source counts and arrival ordering
//! - Directivity and absorption stages
//! - RIR rendering against arrival bins
//! - Real-time rendering and the off-thread echogram handoff

use std::collections::BTreeSet;

use approx::assert_relative_eq;
use rf_room::{
    EchogramBound, Position3D, ReceiverId, RoomConfig, RoomError, ShoeboxScene, SourceId,
    echogram_channel,
};

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZE: usize = 128;
const SPEED_OF_SOUND: f64 = 343.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(dims: [f64; 3], absorption: f32) -> RoomConfig {
    let mut config = RoomConfig::with_uniform_absorption(dims, absorption);
    config.sample_rate = SAMPLE_RATE;
    config.block_size = BLOCK_SIZE;
    config.speed_of_sound = SPEED_OF_SOUND;
    config.circular_buffer_len = 1 << 14;
    config
}

/// 5 x 4 x 3 m room, source (1,1,1), receiver (2,2,1)
fn reference_scene(absorption: f32, sh_order: usize) -> (ShoeboxScene, ReceiverId, SourceId) {
    init_logging();
    let mut scene = ShoeboxScene::new(config([5.0, 4.0, 3.0], absorption)).unwrap();
    let src = scene.add_source(Position3D::new(1.0, 1.0, 1.0)).unwrap();
    let rcv = scene.add_sh_receiver(sh_order, Position3D::new(2.0, 2.0, 1.0)).unwrap();
    (scene, rcv, src)
}

/// Brute-force image count for a time bound
fn count_images(dims: [f64; 3], src: [f64; 3], rcv: [f64; 3], max_distance: f64) -> usize {
    let to_frame = |p: [f64; 3]| [p[0] - dims[0] / 2.0, dims[1] / 2.0 - p[1], p[2] - dims[2] / 2.0];
    let (s, r) = (to_frame(src), to_frame(rcv));
    let n = dims.map(|d| (max_distance / d).ceil() as i32);

    let mut count = 0;
    for i in -n[0]..=n[0] {
        for j in -n[1]..=n[1] {
            for k in -n[2]..=n[2] {
                let d2: f64 = [i, j, k]
                    .iter()
                    .enumerate()
                    .map(|(axis, &m)| {
                        let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
                        let x = m as f64 * dims[axis] + sign * s[axis] - r[axis];
                        x * x
                    })
                    .sum();
                if d2.sqrt() < max_distance {
                    count += 1;
                }
            }
        }
    }
    count
}

// ═══════════════════════════════════════════════════════════════════════════════
// GEOMETRY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reference_room_scenario() {
    let (mut scene, rcv, src) = reference_scene(0.3, 0);
    scene.compute_echograms(EchogramBound::MaxTime(0.05)).unwrap();

    let raw = &scene.echograms(rcv, src).unwrap().raw;
    let expected = count_images(
        [5.0, 4.0, 3.0],
        [1.0, 1.0, 1.0],
        [2.0, 2.0, 1.0],
        0.05 * SPEED_OF_SOUND,
    );
    assert_eq!(raw.len(), expected);

    let first = raw.first_arrival().unwrap();
    assert_relative_eq!(first, 2.0f64.sqrt() / SPEED_OF_SOUND, epsilon = 1e-12);

    // Deterministic across scenes
    let (mut other, rcv2, src2) = reference_scene(0.3, 0);
    other.compute_echograms(EchogramBound::MaxTime(0.05)).unwrap();
    assert_eq!(other.echograms(rcv2, src2).unwrap(), scene.echograms(rcv, src).unwrap());
}

#[test]
fn test_cube_time_and_order_bounds_agree() {
    init_logging();
    let dims = [3.0, 3.0, 3.0];
    let max_time = 0.03;
    let max_distance = max_time * SPEED_OF_SOUND;

    let mut scene = ShoeboxScene::new(config(dims, 0.0)).unwrap();
    let src = scene.add_source(Position3D::new(0.7, 1.2, 2.1)).unwrap();
    let rcv = scene.add_sh_receiver(0, Position3D::new(2.2, 1.9, 0.8)).unwrap();

    scene.compute_echograms(EchogramBound::MaxTime(max_time)).unwrap();
    let timed = scene.echograms(rcv, src).unwrap().raw.len();

    let order = 3 * ((max_distance / 3.0).ceil() as u32 + 1);
    scene.compute_echograms(EchogramBound::MaxOrder(order)).unwrap();
    let ordered = &scene.echograms(rcv, src).unwrap().raw;
    let within = ordered
        .coords
        .iter()
        .filter(|p| p.magnitude() < max_distance)
        .count();

    assert!(ordered.len() > timed);
    assert_eq!(timed, within);
}

#[test]
fn test_arrivals_sorted_and_magnitudes() {
    let (mut scene, rcv, src) = reference_scene(0.1, 2);
    scene.compute_echograms(EchogramBound::MaxOrder(4)).unwrap();
    let set = scene.echograms(rcv, src).unwrap();

    assert!(set.raw.is_time_sorted());
    for (n, coord) in set.raw.coords.iter().enumerate() {
        let d = coord.magnitude();
        let expected = if d <= 1.0 { 1.0 } else { 1.0 / d };
        assert_eq!(set.raw.value[0][n], expected);
        assert_relative_eq!(set.raw.time[n], d / SPEED_OF_SOUND, epsilon = 1e-12);
    }

    // Encoded and absorbed stages are stored in time order
    assert!(set.encoded.time.windows(2).all(|w| w[0] <= w[1]));
    for band in &set.absorbed {
        assert!(band.time.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn test_close_source_clamps_magnitude() {
    init_logging();
    let mut scene = ShoeboxScene::new(config([5.0, 4.0, 3.0], 0.0)).unwrap();
    let src = scene.add_source(Position3D::new(2.0, 2.0, 1.5)).unwrap();
    let rcv = scene.add_sh_receiver(0, Position3D::new(2.5, 2.0, 1.5)).unwrap();
    scene.compute_echograms(EchogramBound::MaxOrder(1)).unwrap();

    let raw = &scene.echograms(rcv, src).unwrap().raw;
    let direct = raw.sorted_idx[0];
    assert_eq!(raw.value[0][direct], 1.0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVITY & ABSORPTION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_order_zero_receiver_matches_raw() {
    let (mut scene, rcv, src) = reference_scene(0.4, 0);
    scene.compute_echograms(EchogramBound::MaxTime(0.04)).unwrap();
    let set = scene.echograms(rcv, src).unwrap();

    assert_eq!(set.encoded.num_channels(), 1);
    let sorted_raw: Vec<f64> = set.raw.sorted_idx.iter().map(|&i| set.raw.value[0][i]).collect();
    assert_eq!(set.encoded.value[0], sorted_raw);
}

#[test]
fn test_zero_absorption_is_identity() {
    let (mut scene, rcv, src) = reference_scene(0.0, 3);
    scene.compute_echograms(EchogramBound::MaxOrder(3)).unwrap();
    let set = scene.echograms(rcv, src).unwrap();

    assert_eq!(set.encoded.num_channels(), 16);
    assert_eq!(set.absorbed.len(), 6);
    for band in &set.absorbed {
        assert_eq!(band, &set.encoded);
    }
}

#[test]
fn test_absorption_attenuates_reflections_only() {
    let (mut scene, rcv, src) = reference_scene(0.5, 0);
    scene.compute_echograms(EchogramBound::MaxOrder(2)).unwrap();
    let set = scene.echograms(rcv, src).unwrap();
    let band = &set.absorbed[0];

    for n in 0..band.len() {
        let bounces: u32 = band.order[n].iter().map(|o| o.unsigned_abs()).sum();
        let expected = set.encoded.value[0][n] * 0.5f64.sqrt().powi(bounces as i32);
        assert_relative_eq!(band.value[0][n], expected, epsilon = 1e-9);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRTY TRACKING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_noop_move_keeps_pairs_clean() {
    let (mut scene, rcv, src) = reference_scene(0.2, 1);
    scene.compute_echograms(EchogramBound::MaxTime(0.03)).unwrap();
    assert!(!scene.is_dirty(rcv, src).unwrap());

    scene.update_source(src, Position3D::new(1.0, 1.0, 1.0)).unwrap();
    scene.update_receiver(rcv, Position3D::new(2.0, 2.0, 1.0)).unwrap();
    assert!(!scene.is_dirty(rcv, src).unwrap());
    assert_eq!(scene.compute_echograms(EchogramBound::MaxTime(0.03)).unwrap(), 0);

    scene.update_source(src, Position3D::new(1.0, 1.0, 1.2)).unwrap();
    assert!(scene.is_dirty(rcv, src).unwrap());
}

#[test]
fn test_room_resize_dirties_everything() {
    let (mut scene, rcv, src) = reference_scene(0.2, 0);
    scene.compute_echograms(EchogramBound::MaxOrder(1)).unwrap();
    let before = scene.echograms(rcv, src).unwrap().clone();

    scene.set_room_dimensions([6.0, 4.0, 3.0]).unwrap();
    assert!(scene.is_dirty(rcv, src).unwrap());
    scene.compute_echograms(EchogramBound::MaxOrder(1)).unwrap();
    assert_ne!(scene.echograms(rcv, src).unwrap(), &before);
}

#[test]
fn test_capacity_limits() {
    init_logging();
    let mut cfg = config([5.0, 4.0, 3.0], 0.1);
    cfg.max_sources = 2;
    cfg.max_receivers = 1;
    let mut scene = ShoeboxScene::new(cfg).unwrap();

    scene.add_source(Position3D::new(1.0, 1.0, 1.0)).unwrap();
    scene.add_source(Position3D::new(2.0, 1.0, 1.0)).unwrap();
    assert!(matches!(
        scene.add_source(Position3D::new(3.0, 1.0, 1.0)),
        Err(RoomError::CapacityExceeded { kind: "source", max: 2 })
    ));
    scene.add_sh_receiver(1, Position3D::new(2.0, 2.0, 2.0)).unwrap();
    assert!(matches!(
        scene.add_sh_receiver(1, Position3D::new(2.0, 2.0, 2.0)),
        Err(RoomError::CapacityExceeded { kind: "receiver", max: 1 })
    ));
    assert!(matches!(
        scene.remove_receiver(ReceiverId(3)),
        Err(RoomError::InvalidHandle { kind: "receiver", id: 3 })
    ));
}

#[test]
fn test_parallel_matches_serial() {
    init_logging();
    let build = |parallel: bool| {
        let mut cfg = config([6.0, 5.0, 3.0], 0.25);
        cfg.parallel_echograms = parallel;
        let mut scene = ShoeboxScene::new(cfg).unwrap();
        for x in 1..5 {
            scene.add_source(Position3D::new(x as f64, 1.0, 1.5)).unwrap();
        }
        scene.add_sh_receiver(1, Position3D::new(3.0, 4.0, 1.2)).unwrap();
        scene.add_sh_receiver(0, Position3D::new(5.0, 2.0, 2.0)).unwrap();
        assert_eq!(scene.compute_echograms(EchogramBound::MaxOrder(3)).unwrap(), 8);
        scene
    };

    let serial = build(false);
    let parallel = build(true);
    for rcv in serial.receiver_ids() {
        for src in serial.source_ids() {
            assert_eq!(
                serial.echograms(rcv, src).unwrap(),
                parallel.echograms(rcv, src).unwrap()
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RIR RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_rir_peaks_on_arrival_bins() {
    let (mut scene, rcv, src) = reference_scene(0.0, 0);
    scene.compute_echograms(EchogramBound::MaxOrder(1)).unwrap();
    assert_eq!(scene.render_rirs(false).unwrap(), 1);

    let set = scene.echograms(rcv, src).unwrap();
    let bins: BTreeSet<usize> = set
        .encoded
        .time
        .iter()
        .map(|t| (t * SAMPLE_RATE).round() as usize)
        .collect();

    let rir = scene.rir(rcv, src).unwrap();
    let fir_order = scene.config().fir_order;
    let max_bin = *bins.iter().next_back().unwrap();
    assert_eq!(rir.num_channels(), 1);
    assert_eq!(rir.len(), max_bin + 1 + fir_order / 2);

    let nonzero: BTreeSet<usize> = rir
        .channel(0)
        .iter()
        .enumerate()
        .filter(|(_, v)| v.abs() > 1e-4)
        .map(|(n, _)| n)
        .collect();
    assert_eq!(nonzero, bins);

    // Direct path carries magnitude 1/sqrt(2)
    let direct_bin = (2.0f64.sqrt() / SPEED_OF_SOUND * SAMPLE_RATE).round() as usize;
    assert_relative_eq!(rir.channel(0)[direct_bin], 0.5f32.sqrt(), epsilon = 1e-4);

    // Nothing changed: nothing to render
    assert_eq!(scene.render_rirs(false).unwrap(), 0);
}

#[test]
fn test_rir_skips_uncomputed_pairs() {
    let (mut scene, rcv, src) = reference_scene(0.3, 1);
    assert_eq!(scene.render_rirs(false).unwrap(), 0);
    assert!(scene.rir(rcv, src).unwrap().is_empty());
    assert!(scene.needs_rir_refresh(rcv, src).unwrap());
}

// ═══════════════════════════════════════════════════════════════════════════════
// REAL-TIME RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_silence_in_silence_out() {
    init_logging();
    let mut scene = ShoeboxScene::new(config([5.0, 4.0, 3.0], 0.2)).unwrap();
    let a = scene.add_source(Position3D::new(1.0, 1.0, 1.0)).unwrap();
    let b = scene.add_source(Position3D::new(4.0, 3.0, 2.0)).unwrap();
    let rcv = scene.add_sh_receiver(1, Position3D::new(2.0, 2.0, 1.0)).unwrap();
    scene.compute_echograms(EchogramBound::MaxTime(0.05)).unwrap();

    let silence = vec![0.0f32; BLOCK_SIZE];
    let mut output = vec![vec![1.0f32; BLOCK_SIZE]; 4];
    for _ in 0..8 {
        scene
            .apply_echogram_td(rcv, &[(a, &silence[..]), (b, &silence[..])], &mut output, BLOCK_SIZE)
            .unwrap();
        assert!(output.iter().flatten().all(|v| *v == 0.0));
    }
}

#[test]
fn test_impulse_arrives_after_direct_delay() {
    let (mut scene, rcv, src) = reference_scene(0.0, 0);
    scene.compute_echograms(EchogramBound::MaxTime(0.02)).unwrap();
    let direct_delay = (2.0f64.sqrt() / SPEED_OF_SOUND * SAMPLE_RATE).round() as usize;

    let mut impulse = vec![0.0f32; BLOCK_SIZE];
    impulse[0] = 1.0;

    let with_impulse = [(src, impulse.as_slice())];

    let mut rendered = Vec::new();
    for block in 0..16 {
        let mut output = vec![vec![0.0f32; BLOCK_SIZE]];
        let inputs: &[(SourceId, &[f32])] = if block == 0 { &with_impulse } else { &[] };
        scene.apply_echogram_td(rcv, inputs, &mut output, BLOCK_SIZE).unwrap();
        rendered.extend_from_slice(&output[0]);
    }

    assert!(rendered[..direct_delay].iter().all(|v| *v == 0.0));
    assert!(rendered[direct_delay..].iter().any(|v| v.abs() > 0.01));
    assert!(rendered.iter().all(|v| v.is_finite()));
}

/// One source at (1,1,1) heard by receivers at `positions`, 5 x 4 x 3 m room
fn multi_receiver_scene(positions: &[[f64; 3]]) -> (ShoeboxScene, SourceId, Vec<ReceiverId>) {
    init_logging();
    let mut scene = ShoeboxScene::new(config([5.0, 4.0, 3.0], 0.3)).unwrap();
    let src = scene.add_source(Position3D::new(1.0, 1.0, 1.0)).unwrap();
    let receivers = positions
        .iter()
        .map(|p| scene.add_sh_receiver(1, Position3D::from(*p)).unwrap())
        .collect();
    scene.compute_echograms(EchogramBound::MaxTime(0.03)).unwrap();
    (scene, src, receivers)
}

#[test]
fn test_receivers_share_source_history() {
    let near = [3.0, 2.0, 1.5];
    let far = [4.5, 3.5, 2.5];
    let (mut shared, src, rcvs) = multi_receiver_scene(&[near, far]);
    let (mut solo_near, src_n, rn) = multi_receiver_scene(&[near]);
    let (mut solo_far, src_f, rf) = multi_receiver_scene(&[far]);

    let input: Vec<f32> = (0..BLOCK_SIZE).map(|n| (n as f32 * 0.05).sin()).collect();
    for block in 0..6 {
        // Alternate which receiver pushes the block
        let order = if block % 2 == 0 { [0, 1] } else { [1, 0] };
        let mut outs = vec![vec![vec![0.0f32; BLOCK_SIZE]; 4]; 2];
        for i in order {
            scene_render(&mut shared, rcvs[i], src, &input, &mut outs[i]);
        }

        let mut expected_near = vec![vec![0.0f32; BLOCK_SIZE]; 4];
        let mut expected_far = vec![vec![0.0f32; BLOCK_SIZE]; 4];
        scene_render(&mut solo_near, rn[0], src_n, &input, &mut expected_near);
        scene_render(&mut solo_far, rf[0], src_f, &input, &mut expected_far);

        assert_eq!(outs[0], expected_near);
        assert_eq!(outs[1], expected_far);
    }
}

fn scene_render(
    scene: &mut ShoeboxScene,
    rcv: ReceiverId,
    src: SourceId,
    input: &[f32],
    output: &mut [Vec<f32>],
) {
    scene
        .apply_echogram_td(rcv, &[(src, input)], output, BLOCK_SIZE)
        .unwrap();
}

#[test]
fn test_delay_beyond_buffer_rejected() {
    init_logging();
    let mut cfg = config([5.0, 4.0, 3.0], 0.1);
    // One block of the history is taken by the block being written
    cfg.circular_buffer_len = 1 << 11;
    let mut scene = ShoeboxScene::new(cfg).unwrap();
    scene.add_source(Position3D::new(1.0, 1.0, 1.0)).unwrap();
    scene.add_sh_receiver(0, Position3D::new(2.0, 2.0, 1.0)).unwrap();

    assert!(matches!(
        scene.compute_echograms(EchogramBound::MaxTime(0.1)),
        Err(RoomError::DelayExceedsBuffer { capacity: 1921, .. })
    ));
    assert!(matches!(
        scene.compute_echograms(EchogramBound::MaxTime(0.0)),
        Err(RoomError::InvalidBound(_))
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDOFF
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_handoff_matches_inline_compute() {
    let (mut inline, rcv, src) = reference_scene(0.25, 2);
    inline.compute_echograms(EchogramBound::MaxTime(0.04)).unwrap();

    let (mut scene, rcv2, src2) = reference_scene(0.25, 2);
    let jobs = scene.echogram_jobs(EchogramBound::MaxTime(0.04)).unwrap();
    assert_eq!(jobs.len(), 1);

    let (mut tx, mut rx) = echogram_channel(8);
    let worker = std::thread::spawn(move || {
        for job in jobs {
            let update = job.run().unwrap();
            assert!(tx.push(update).is_ok());
        }
    });
    worker.join().unwrap();

    assert_eq!(scene.install_echograms(&mut rx), 1);
    assert!(!scene.is_dirty(rcv2, src2).unwrap());
    assert_eq!(
        scene.echograms(rcv2, src2).unwrap(),
        inline.echograms(rcv, src).unwrap()
    );
}

#[test]
fn test_handoff_drops_stale_updates() {
    let (mut scene, rcv, src) = reference_scene(0.25, 0);
    let jobs = scene.echogram_jobs(EchogramBound::MaxOrder(2)).unwrap();
    let (mut tx, mut rx) = echogram_channel(4);
    for job in jobs {
        assert!(tx.push(job.run().unwrap()).is_ok());
    }

    // Source moves while the worker is busy
    scene.update_source(src, Position3D::new(1.5, 1.0, 1.0)).unwrap();
    assert_eq!(scene.install_echograms(&mut rx), 0);
    assert!(scene.is_dirty(rcv, src).unwrap());
}

#[test]
fn test_handoff_drops_updates_for_recreated_pair() {
    let (mut scene, rcv, src) = reference_scene(0.25, 1);
    let jobs = scene.echogram_jobs(EchogramBound::MaxOrder(2)).unwrap();
    let (mut tx, mut rx) = echogram_channel(4);
    for job in jobs {
        assert!(tx.push(job.run().unwrap()).is_ok());
    }

    // Receiver replaced while the worker is busy; the new one takes the same ID
    scene.remove_receiver(rcv).unwrap();
    let again = scene.add_sh_receiver(3, Position3D::new(4.0, 3.0, 2.0)).unwrap();
    assert_eq!(again, rcv);

    assert_eq!(scene.install_echograms(&mut rx), 0);
    assert!(scene.is_dirty(again, src).unwrap());

    scene.compute_echograms(EchogramBound::MaxOrder(2)).unwrap();
    let set = scene.echograms(again, src).unwrap();
    assert_eq!(set.encoded.num_channels(), 16);
    let direct = set.raw.first_arrival().unwrap() * SPEED_OF_SOUND;
    assert_relative_eq!(direct, 14.0f64.sqrt(), epsilon = 1e-9);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_config_file_round_trip() {
    let cfg = config([7.0, 5.0, 3.2], 0.15);
    let path = std::env::temp_dir().join(format!("rf-room-config-{}.json", std::process::id()));
    std::fs::write(&path, cfg.to_json_string().unwrap()).unwrap();

    let loaded = RoomConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.dimensions, cfg.dimensions);
    assert_eq!(loaded.block_size, BLOCK_SIZE);
    assert!(ShoeboxScene::new(loaded).is_ok());

    assert!(matches!(
        RoomConfig::from_file("/nonexistent/rf-room.json"),
        Err(RoomError::IoError(_))
    ));
}
