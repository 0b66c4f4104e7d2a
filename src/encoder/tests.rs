// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use super::*;

use crate::predictor::Counter;

/// Build an enabled encoder writing to the given buffer
fn enabled_encoder(buffer: &mut [u8], mode: BranchMode) -> Encoder<sink::Slice<'_>> {
    let mut encoder = builder()
        .with_sink(sink::Slice::new(buffer))
        .with_mode(mode)
        .build()
        .expect("Could not build encoder");
    encoder.set_enabled(true);
    encoder
}

macro_rules! encoder_test {
    ($n:ident, $m:ident, $( ($a:expr, $t:expr, $k:ident) => $p:expr ),* $(,)?) => {
        encoder_test!($n, $m, [], $( ($a, $t, $k) => $p ),*);
    };
    ($n:ident, $m:ident, [$( $s:expr => $c:ident ),*], $( ($a:expr, $t:expr, $k:ident) => $p:expr ),* $(,)?) => {
        #[test]
        fn $n() {
            let mut buffer = [0; 256];
            let mut encoder = enabled_encoder(&mut buffer, BranchMode::$m);
            $(
                encoder.predictor_mut().set($s, Counter::$c);
            )*
            $(
                let packet = encoder
                    .push_ingress(Ingress::new($a, $t, Kind::$k))
                    .expect("Could not push ingress");
                assert_eq!(packet, $p);
            )*
        }
    };
}

// Target mode
encoder_test!(
    target_branches,
    Target,
    (0x1000, 0, BranchTaken) => Some(Packet::sync(0x800, 0)),
    (0x1004, 1, BranchNotTaken) => Some(Packet::direct(FHeader::TakenBranch, 0)),
    (0x1008, 2, None) => Some(Packet::direct(FHeader::NotTaken, 1)),
    (0x100c, 3, None) => None,
);
encoder_test!(
    target_inferable_jump,
    Target,
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x1004, 7, JumpInferable) => None,
    (0x2000, 8, None) => Some(Packet::direct(FHeader::InferableJump, 7)),
);
encoder_test!(
    target_uninferable_jump,
    Target,
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x1004, 3, JumpUninferable) => None,
    (0x2000, 4, None) => Some(Packet::uninferable_jump(0x1802, 3)),
    (0x2002, 5, None) => None,
);
encoder_test!(
    target_traps,
    Target,
    (0x100, 0, None) => Some(Packet::sync(0x80, 0)),
    (0x104, 10, Exception) => None,
    (0x800, 12, TrapReturn) => Some(Packet::trap(TrapType::Exception, 0x482, 10)),
    (0x108, 13, Interrupt) => Some(Packet::trap(TrapType::TrapReturn, 0x484, 2)),
    (0x900, 20, None) => Some(Packet::trap(TrapType::Interrupt, 0x404, 1)),
);
encoder_test!(
    target_large_delta,
    Target,
    (0x0, 0, None) => Some(Packet::sync(0, 0)),
    (0x4, 100, BranchTaken) => None,
    (0x8, 200, None) => Some(Packet::direct(FHeader::TakenBranch, 100)),
);
encoder_test!(
    target_timestamp_baseline,
    Target,
    (0x0, 5, None) => Some(Packet::sync(0, 5)),
    (0x4, 9, BranchTaken) => None,
    (0x8, 10, BranchTaken) => Some(Packet::direct(FHeader::TakenBranch, 4)),
    (0xc, 30, None) => Some(Packet::direct(FHeader::TakenBranch, 1)),
);
// The address of a jump is relative to the instruction following it, not to
// the address reported last
encoder_test!(
    target_consecutive_uninferable_jumps,
    Target,
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x1100, 1, JumpUninferable) => None,
    (0x2000, 2, JumpUninferable) => Some(Packet::uninferable_jump(0x1880, 1)),
    (0x3000, 3, None) => Some(Packet::uninferable_jump(0x800, 1)),
);

// Reserved modes only produce sync packets
encoder_test!(
    history_mode,
    History,
    (0x1000, 0, BranchTaken) => Some(Packet::sync(0x800, 0)),
    (0x1004, 1, JumpUninferable) => None,
    (0x2000, 2, Exception) => None,
    (0x3000, 3, None) => None,
);
encoder_test!(
    reserved_mode,
    Reserved,
    (0x1000, 0, BranchTaken) => Some(Packet::sync(0x800, 0)),
    (0x1004, 1, BranchTaken) => None,
    (0x1008, 2, None) => None,
);

// Prediction mode
encoder_test!(
    prediction_hit_accumulation,
    Prediction,
    [0x2000 => StrongTaken],
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x2000, 1, BranchTaken) => None,
    (0x2000, 2, BranchTaken) => None,
    (0x2000, 3, BranchTaken) => None,
    (0x3000, 4, JumpInferable) => Some(Packet::hit(3)),
    (0x3004, 5, None) => Some(Packet::direct(FHeader::InferableJump, 4)),
);
encoder_test!(
    prediction_miss_is_delayed,
    Prediction,
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x2000, 1, BranchTaken) => None,
    (0x2004, 2, None) => Some(Packet::direct(FHeader::MISS, 1)),
    (0x2008, 3, None) => None,
);
encoder_test!(
    prediction_miss_flushes_hits,
    Prediction,
    [0x2000 => StrongTaken],
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x2000, 1, BranchTaken) => None,
    (0x2000, 2, BranchNotTaken) => Some(Packet::hit(1)),
    (0x2004, 3, None) => Some(Packet::direct(FHeader::MISS, 2)),
    (0x2008, 4, None) => None,
);
encoder_test!(
    prediction_miss_before_pending_hit,
    Prediction,
    [0x2010 => StrongTaken],
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x2000, 1, BranchTaken) => None,
    (0x2010, 2, BranchTaken) => Some(Packet::direct(FHeader::MISS, 1)),
    (0x2014, 3, None) => None,
    (0x2018, 4, JumpInferable) => Some(Packet::hit(1)),
    (0x201c, 5, None) => Some(Packet::direct(FHeader::InferableJump, 3)),
);
encoder_test!(
    prediction_jump_without_hits,
    Prediction,
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x1004, 1, JumpUninferable) => None,
    (0x4000, 2, None) => Some(Packet::uninferable_jump(0x2802, 1)),
);
encoder_test!(
    prediction_trap_flushes_hits,
    Prediction,
    [0x2000 => StrongNotTaken],
    (0x1000, 0, None) => Some(Packet::sync(0x800, 0)),
    (0x2000, 1, BranchNotTaken) => None,
    (0x2000, 2, BranchNotTaken) => None,
    (0x2004, 3, Exception) => Some(Packet::hit(2)),
    (0x8000, 4, None) => Some(Packet::trap(TrapType::Exception, 0x4000 ^ 0x1002, 3)),
);
// The record opening a segment is not predicted
encoder_test!(
    prediction_sync_record_not_predicted,
    Prediction,
    [0x1000 => StrongTaken],
    (0x1000, 0, BranchTaken) => Some(Packet::sync(0x800, 0)),
    (0x1004, 1, JumpInferable) => None,
    (0x1008, 2, None) => Some(Packet::direct(FHeader::InferableJump, 1)),
);

#[test]
fn target_bytes() {
    let mut buffer = [0; 64];
    let mut encoder = enabled_encoder(&mut buffer, BranchMode::Target);
    encoder
        .push_ingress(Ingress::new(0x1000, 0, Kind::BranchTaken))
        .expect("Could not push ingress");
    encoder
        .push_ingress(Ingress::new(0x1004, 1, Kind::BranchNotTaken))
        .expect("Could not push ingress");
    assert_eq!(encoder.sink().written(), b"\x16\x00\x90\x80\x00");
}

#[test]
fn prediction_bytes() {
    let mut buffer = [0; 64];
    let mut encoder = enabled_encoder(&mut buffer, BranchMode::Prediction);
    encoder.predictor_mut().set(0x2000, Counter::StrongTaken);
    [
        Ingress::new(0x1000, 0, Kind::None),
        Ingress::new(0x2000, 1, Kind::BranchTaken),
        Ingress::new(0x2000, 2, Kind::BranchTaken),
        Ingress::new(0x2000, 3, Kind::BranchTaken),
        Ingress::new(0x3000, 4, Kind::JumpInferable),
        Ingress::new(0x3004, 5, Kind::None),
    ]
    .into_iter()
    .for_each(|i| {
        encoder.push_ingress(i).expect("Could not push ingress");
    });
    assert_eq!(encoder.pending_hits(), 0);
    assert_eq!(encoder.sink().written(), b"\x16\x00\x90\x80\x0c\x13");
}

#[test]
fn pending_hits() {
    let mut buffer = [0; 64];
    let mut encoder = enabled_encoder(&mut buffer, BranchMode::Prediction);
    encoder.predictor_mut().set(0x2000, Counter::StrongTaken);
    encoder
        .push_ingress(Ingress::new(0x1000, 0, Kind::None))
        .expect("Could not push ingress");
    (1..=3).for_each(|t| {
        let packet = encoder
            .push_ingress(Ingress::new(0x2000, t, Kind::BranchTaken))
            .expect("Could not push ingress");
        assert_eq!(packet, None);
        assert_eq!(encoder.pending_hits(), t);
    });
    assert_eq!(encoder.predictor().peek(0x2000), Counter::StrongTaken);
}

#[test]
fn enable_disable() {
    let mut buffer = [0; 64];
    let mut encoder = enabled_encoder(&mut buffer, BranchMode::Target);
    assert_eq!(encoder.state(), State::Idle);

    let first = encoder
        .push_ingress(Ingress::new(0x100, 0, Kind::None))
        .expect("Could not push ingress");
    assert_eq!(first, Some(Packet::sync(0x80, 0)));
    assert_eq!(encoder.state(), State::Data);

    encoder.set_enabled(false);
    let second = encoder
        .push_ingress(Ingress::new(0x200, 5, Kind::BranchTaken))
        .expect("Could not push ingress");
    assert_eq!(second, Some(Packet::sync(0x100, 5)));
    assert_eq!(encoder.state(), State::Idle);

    let third = encoder
        .push_ingress(Ingress::new(0x300, 6, Kind::JumpUninferable))
        .expect("Could not push ingress");
    assert_eq!(third, None);
    assert_eq!(encoder.state(), State::Idle);
    assert_eq!(encoder.sink().written(), b"\x16\x00\x81\x80\x16\x00\x82\x85");
}

#[test]
fn idle_while_disabled() {
    let mut buffer = [0; 64];
    let mut encoder: Encoder<_> = builder()
        .with_sink(sink::Slice::new(&mut buffer))
        .build()
        .expect("Could not build encoder");
    assert!(!encoder.is_enabled());
    (0..8).for_each(|t| {
        let packet = encoder
            .push_ingress(Ingress::new(0x1000 + 4 * t, t, Kind::BranchTaken))
            .expect("Could not push ingress");
        assert_eq!(packet, None);
    });
    assert!(encoder.sink().is_empty());
    assert_eq!(encoder.state(), State::Idle);
}

#[test]
fn segment_opening_jump() {
    let mut buffer = [0; 64];
    let mut encoder: Encoder<_> = builder()
        .with_sink(sink::Slice::new(&mut buffer))
        .build()
        .expect("Could not build encoder");
    encoder
        .push_ingress(Ingress::new(0x1000, 0, Kind::None))
        .expect("Could not push ingress");
    encoder.set_enabled(true);
    encoder
        .push_ingress(Ingress::new(0x1004, 1, Kind::JumpUninferable))
        .expect("Could not push ingress");
    let packet = encoder
        .push_ingress(Ingress::new(0x4000, 2, Kind::None))
        .expect("Could not push ingress");
    assert_eq!(packet, Some(Packet::uninferable_jump(0x2000 ^ 0x802, 0)));
}

#[test]
fn mode_accessors() {
    let mut encoder: Encoder<_> = builder()
        .with_params(&config::Parameters {
            br_mode: BranchMode::Prediction,
            ..Default::default()
        })
        .build()
        .expect("Could not build encoder");
    assert_eq!(encoder.mode(), BranchMode::Prediction);
    encoder.set_mode(BranchMode::Target);
    assert_eq!(encoder.mode(), BranchMode::Target);
    encoder.reset();
    assert_eq!(encoder.mode(), BranchMode::Target);
}

#[test]
fn reset_idempotence() {
    let mut buffer = [0; 256];
    let mut encoder = enabled_encoder(&mut buffer, BranchMode::Prediction);
    (0..32u64).for_each(|t| {
        let kind = if t % 5 == 4 {
            Kind::JumpInferable
        } else if t % 3 == 0 {
            Kind::BranchTaken
        } else {
            Kind::BranchNotTaken
        };
        encoder
            .push_ingress(Ingress::new(0x2000 + 8 * t, t, kind))
            .expect("Could not push ingress");
    });

    fn check(encoder: &Encoder<sink::Slice<'_>>) {
        assert_eq!(encoder.state(), State::Idle);
        assert!(!encoder.is_enabled());
        assert_eq!(encoder.pending_hits(), 0);
        assert!((0..2048u64).all(|pc| encoder.predictor().peek(pc) == Counter::WeakNotTaken));
    }

    encoder.reset();
    check(&encoder);
    encoder.reset();
    check(&encoder);

    encoder.set_enabled(true);
    let packet = encoder
        .push_ingress(Ingress::new(0x100, 42, Kind::None))
        .expect("Could not push ingress");
    assert_eq!(packet, Some(Packet::sync(0x80, 42)));
}

#[test]
fn at_most_one_packet() {
    use crate::packet::util::varint_len;

    for mode in [BranchMode::Target, BranchMode::Prediction] {
        let mut buffer = [0; 1 << 15];
        let mut encoder: Encoder<_> = builder()
            .with_sink(sink::Slice::new(&mut buffer))
            .with_mode(mode)
            .with_bp_entries(1024)
            .build()
            .expect("Could not build encoder");

        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut timestamp = 0;
        for _ in 0..1000 {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let rand = seed >> 33;
            if rand % 97 == 0 {
                encoder.set_enabled(!encoder.is_enabled());
            } else if rand % 89 == 0 {
                encoder.set_enabled(true);
            }
            timestamp += (rand >> 8) % 100;
            let kind = Kind::try_from((rand % 8) as u8).expect("Invalid kind");
            // Only a few distinct addresses, so that predictions hit sometimes
            let address = 0x8000_0000 + ((rand >> 16) % 16) * 4;

            let before = encoder.sink().len();
            let packet = encoder
                .push_ingress(Ingress::new(address, timestamp, kind))
                .expect("Could not push ingress");
            let written = encoder.sink().len() - before;
            match packet {
                Some(packet) => {
                    assert_eq!(written, packet.encoded_len());
                    if packet.is_compressed() {
                        assert_eq!(written, 1);
                    } else if packet.f_header.has_address() {
                        assert_eq!(
                            written,
                            1 + varint_len(packet.address) + varint_len(packet.timestamp)
                        );
                    }
                }
                None => assert_eq!(written, 0),
            }
        }
    }
}

#[test]
fn zero_entries() {
    let res: Result<Encoder<_>, _> = builder().with_bp_entries(0).build();
    assert_eq!(res.err(), Some(Error::CannotConstructPredictor(0)));
}

#[test]
fn static_table_size_mismatch() {
    let res: Result<Encoder<_>, _> = builder().with_bp_entries(512).build();
    assert_eq!(res.err(), Some(Error::CannotConstructPredictor(512)));
}

#[cfg(feature = "alloc")]
#[test]
fn boxed_table() {
    use crate::predictor::BoxedTable;

    let res: Result<Encoder<_, BoxedTable>, _> = builder().with_bp_entries(0).build();
    assert_eq!(res.err(), Some(Error::CannotConstructPredictor(0)));

    let encoder: Encoder<_, BoxedTable> = builder()
        .with_bp_entries(64)
        .build()
        .expect("Could not build encoder");
    assert_eq!(encoder.predictor().entries(), 64);
}

#[cfg(feature = "alloc")]
#[test]
fn vec_sink() {
    let mut encoder: Encoder<_> = builder()
        .with_sink(alloc::vec::Vec::new())
        .build()
        .expect("Could not build encoder");
    encoder.set_enabled(true);
    encoder
        .push_ingress(Ingress::new(0x1000, 0, Kind::BranchTaken))
        .expect("Could not push ingress");
    encoder
        .push_ingress(Ingress::new(0x1004, 1, Kind::BranchNotTaken))
        .expect("Could not push ingress");
    assert_eq!(encoder.into_sink(), b"\x16\x00\x90\x80\x00");
}

#[test]
fn fn_sink() {
    let mut calls = 0;
    let mut bytes = 0;
    {
        let sink = sink::from_fn(|data: &[u8]| {
            calls += 1;
            bytes += data.len();
            Ok::<_, core::convert::Infallible>(())
        });
        let mut encoder: Encoder<_> = builder()
            .with_sink(sink)
            .build()
            .expect("Could not build encoder");
        encoder.set_enabled(true);
        encoder
            .push_ingress(Ingress::new(0x1000, 0, Kind::BranchTaken))
            .expect("Could not push ingress");
        encoder
            .push_ingress(Ingress::new(0x1004, 1, Kind::BranchNotTaken))
            .expect("Could not push ingress");
    }
    assert_eq!(calls, 2);
    assert_eq!(bytes, 5);
}

#[test]
fn sink_error() {
    let mut buffer = [0; 2];
    let mut encoder = enabled_encoder(&mut buffer, BranchMode::Target);
    let res = encoder.push_ingress(Ingress::new(0x1000, 0, Kind::None));
    assert_eq!(res, Err(Error::Sink(sink::Full)));
    assert_eq!(encoder.state(), State::Data);
    assert!(encoder.sink().is_empty());

    // A packet that fits is still accepted
    let res = encoder.push_ingress(Ingress::new(0x1004, 1, Kind::BranchTaken));
    assert_eq!(res, Ok(None));
    let res = encoder.push_ingress(Ingress::new(0x1008, 2, Kind::None));
    assert_eq!(res, Ok(Some(Packet::direct(FHeader::TakenBranch, 1))));
    assert_eq!(encoder.sink().written(), b"\x04");
}
