use meade_dsi::command::Command;
use meade_dsi::{
    for_chip, DsiCamera, Error, Geometry, ImagingState, ReadMode, BYTES_PER_PIXEL,
};
use utilities::{MockTransport, SimCamera};

/// Half-frame where every pixel of raw row `r` reads `base + r`.
fn half_frame(geometry: &Geometry, rows: usize, base: u16) -> Vec<u8> {
    let mut buf = vec![0u8; BYTES_PER_PIXEL * geometry.raw_width * rows];
    for (r, row) in buf
        .chunks_exact_mut(BYTES_PER_PIXEL * geometry.raw_width)
        .enumerate()
    {
        let value = (base + r as u16).to_be_bytes();
        for px in row.chunks_exact_mut(2) {
            px.copy_from_slice(&value);
        }
    }
    buf
}

fn sim_with_frames(chip: &str) -> SimCamera {
    let geometry = for_chip(chip).expect("chip under test is supported");
    SimCamera::with_frames(
        chip,
        half_frame(geometry, geometry.rows_even, 0x1000),
        half_frame(geometry, geometry.rows_odd, 0x2000),
    )
}

#[test]
fn open_identifies_dsi_pro() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    assert_eq!(camera.chip_name(), "ICX254AL");
    assert_eq!(camera.model_name(), "DSI Pro");
    assert_eq!(camera.image_width(), 508);
    assert_eq!(camera.image_height(), 489);
    assert_eq!(camera.firmware_version().to_string(), "10.1.1.0");
    assert_eq!(camera.imaging_state(), ImagingState::Idle);
    assert_eq!(camera.camera_name().unwrap(), "DSI1");
    assert_eq!(camera.serial_number().unwrap(), "0123456789abcdef");
}

#[test]
fn open_rejects_unknown_chip() {
    match DsiCamera::new(SimCamera::new("ICX285AL")) {
        Ok(_) => panic!("open must fail without a geometry"),
        Err(Error::UnsupportedChip(chip)) => assert_eq!(chip, "ICX285AL"),
        Err(other) => panic!("expected UnsupportedChip, got {other:?}"),
    }
}

#[test]
fn open_programs_rows_on_icx429() {
    let camera = DsiCamera::new(SimCamera::new("ICX429AKL")).unwrap();
    assert_eq!(camera.model_name(), "DSI Color II");
    let log = &camera.transport().log;
    let tail: Vec<_> = log[log.len() - 4..].to_vec();
    assert_eq!(
        tail,
        vec![
            (Command::SetRowCountEven, 299),
            (Command::SetRowCountOdd, 298),
            (Command::AdWrite, 88),
            (Command::AdWrite, 704),
        ]
    );
}

#[test]
fn no_bringup_writes_on_dsi_pro() {
    let camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    assert!(!camera
        .transport()
        .commands()
        .iter()
        .any(|c| matches!(c, Command::SetRowCountEven | Command::SetRowCountOdd | Command::AdWrite)));
}

#[test]
fn sequence_numbers_strictly_increase() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    camera.start_exposure(0.1).unwrap();
    let seqs = &camera.transport().seqs;
    assert_eq!(seqs[0], 1);
    for pair in seqs.windows(2) {
        assert_eq!(pair[1], pair[0].wrapping_add(1));
    }
}

#[test]
fn short_exposure_configures_fast_readout() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    let before = camera.transport().log.len();
    camera.start_exposure(0.1).unwrap();
    assert_eq!(camera.imaging_state(), ImagingState::Exposing);
    assert_eq!(
        camera.transport().log[before..],
        [
            (Command::SetExpTime, 1000),
            (Command::SetReadoutSpeed, 1), // high
            (Command::SetReadoutDelay, 3),
            (Command::SetReadoutMode, 0), // dual
            (Command::SetVddMode, 1),     // on
            (Command::SetGain, 63),       // 100%
            (Command::SetOffset, 0),      // 50%
            (Command::SetFlushMode, 0),   // continuous
            (Command::Trigger, 0),
        ]
    );
}

#[test]
fn long_exposure_configures_slow_readout() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    camera.set_amp_gain(0);
    camera.set_amp_offset(20);
    let before = camera.transport().log.len();
    camera.start_exposure(2.0).unwrap();
    assert_eq!(
        camera.transport().log[before..],
        [
            (Command::SetExpTime, 20_000),
            (Command::SetReadoutSpeed, 0), // low
            (Command::SetReadoutDelay, 5),
            (Command::SetReadoutMode, 1), // single
            (Command::SetVddMode, 0),     // auto
            (Command::SetGain, 0),
            (Command::SetOffset, 0x199), // 20% -> sign bit set
            (Command::SetFlushMode, 0),
            (Command::Trigger, 0),
        ]
    );
}

#[test]
fn percentage_accessors_clamp() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    camera.set_amp_gain(250);
    assert_eq!(camera.amp_gain(), 100);
    camera.set_amp_offset(101);
    assert_eq!(camera.amp_offset(), 100);
}

#[test]
fn raw_registers_refuse_out_of_range_values() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    let before = camera.transport().log.len();
    assert!(matches!(
        camera.set_gain(64),
        Err(Error::OutOfRange { max: 63, .. })
    ));
    assert!(matches!(
        camera.set_offset(0x200),
        Err(Error::OutOfRange { max: 0x1ff, .. })
    ));
    // refused before any device traffic
    assert_eq!(camera.transport().log.len(), before);
}

#[test]
fn read_image_requires_running_exposure() {
    let mut camera = DsiCamera::new(sim_with_frames("ICX254AL")).unwrap();
    let before = camera.transport().log.len();
    assert!(matches!(
        camera.read_image(ReadMode::Blocking),
        Err(Error::NotExposing)
    ));
    assert_eq!(camera.transport().log.len(), before);
    assert_eq!(camera.imaging_state(), ImagingState::Idle);
}

#[test]
fn capture_round_trip() {
    let mut camera = DsiCamera::new(sim_with_frames("ICX254AL")).unwrap();
    camera.start_exposure(0.1).unwrap();
    {
        let image = camera.read_image(ReadMode::Blocking).unwrap();
        assert_eq!(image.width, 508);
        assert_eq!(image.height, 489);
        assert_eq!(image.data.len(), 508 * 489);
        // (0 + 13) is odd: first row comes from the odd half, raw row 6
        assert_eq!(image.data[0], 0x2000 + 6);
        // (1 + 13) is even: second row from the even half, raw row 7
        assert_eq!(image.data[508], 0x1000 + 7);
    }
    assert_eq!(camera.imaging_state(), ImagingState::Idle);
    // A short exposure never touches the exposure timer
    assert!(!camera
        .transport()
        .commands()
        .contains(&Command::GetExpTimerCount));
}

#[test]
fn long_exposure_nonblocking_returns_would_block() {
    let mut sim = sim_with_frames("ICX254AL");
    sim.ticks_left = 15_000;
    let mut camera = DsiCamera::new(sim).unwrap();
    camera.start_exposure(2.0).unwrap();
    assert!(matches!(
        camera.read_image(ReadMode::NonBlocking),
        Err(Error::WouldBlock)
    ));
    // Still exposing: the caller may poll again
    assert_eq!(camera.imaging_state(), ImagingState::Exposing);
    let polls = camera
        .transport()
        .commands()
        .iter()
        .filter(|c| **c == Command::GetExpTimerCount)
        .count();
    assert_eq!(polls, 1);
    // The simulator finished the exposure after the first poll
    let image = camera.read_image(ReadMode::NonBlocking).unwrap();
    assert_eq!(image.data[0], 0x2000 + 6);
}

#[test]
fn long_exposure_blocking_polls_until_done() {
    let mut sim = sim_with_frames("ICX254AL");
    sim.ticks_left = 15_000;
    let mut camera = DsiCamera::new(sim).unwrap();
    camera.start_exposure(2.0).unwrap();
    camera.read_image(ReadMode::Blocking).unwrap();
    let polls = camera
        .transport()
        .commands()
        .iter()
        .filter(|c| **c == Command::GetExpTimerCount)
        .count();
    assert!(polls >= 2, "expected at least one sleep-and-repoll, saw {polls}");
}

#[test]
fn failed_half_frame_read_resets_to_idle() {
    let mut sim = sim_with_frames("ICX254AL");
    sim.fail_image_reads = true;
    let mut camera = DsiCamera::new(sim).unwrap();
    camera.start_exposure(0.1).unwrap();
    assert!(matches!(
        camera.read_image(ReadMode::Blocking),
        Err(Error::Transport(_))
    ));
    assert_eq!(camera.imaging_state(), ImagingState::Idle);
    // The exposure is spent; reading again is a precondition error
    assert!(matches!(
        camera.read_image(ReadMode::Blocking),
        Err(Error::NotExposing)
    ));
}

#[test]
fn abort_requires_reset_before_next_exposure() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    camera.start_exposure(2.0).unwrap();
    camera.abort_exposure().unwrap();
    assert_eq!(camera.imaging_state(), ImagingState::Aborting);
    camera.reset().unwrap();
    assert_eq!(camera.imaging_state(), ImagingState::Idle);
    let log = &camera.transport().log;
    assert!(log.contains(&(Command::Abort, 0)));
}

#[test]
fn camera_name_round_trips_through_eeprom() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    assert_eq!(camera.camera_name().unwrap(), "DSI1");
    camera.set_camera_name("Guider").unwrap();
    assert_eq!(camera.camera_name().unwrap(), "Guider");
    // Read back through the device rather than the cache
    assert_eq!(camera.eeprom_read_string(0x1c, 0x20).unwrap(), "Guider");
}

#[test]
fn eeprom_rejects_out_of_range_offsets() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    assert_eq!(camera.eeprom_length().unwrap(), 64);
    let before = camera.transport().log.len();
    assert!(matches!(
        camera.eeprom_read_byte(64),
        Err(Error::OutOfRange { .. })
    ));
    assert!(matches!(
        camera.eeprom_write_byte(200, 0),
        Err(Error::OutOfRange { .. })
    ));
    assert_eq!(camera.transport().log.len(), before);
}

#[test]
fn temperature_scaling() {
    let mut camera = DsiCamera::new(SimCamera::new("ICX254AL")).unwrap();
    // raw 500: floor(500 / 25.6) = 19 -> 1.9 degrees
    assert_eq!(camera.temperature().unwrap(), 1.9);
}

#[test]
fn mismatched_sequence_is_a_protocol_violation() {
    let mut mock = MockTransport::new();
    mock.expect_bulk_write()
        .returning(|_, bytes, _| Ok(bytes.len()));
    mock.expect_bulk_read().returning(|_, buf, _| {
        // PING reply carrying the wrong sequence number
        buf[..3].copy_from_slice(&[0x03, 0x77, 0x06]);
        Ok(3)
    });
    match DsiCamera::new(mock) {
        Ok(_) => panic!("open must fail on a protocol violation"),
        Err(err) => assert!(matches!(
            err,
            Error::SequenceMismatch {
                expected: 1,
                got: 0x77
            }
        )),
    }
}

#[test]
fn missing_ack_is_a_protocol_violation() {
    let mut mock = MockTransport::new();
    mock.expect_bulk_write()
        .returning(|_, bytes, _| Ok(bytes.len()));
    mock.expect_bulk_read().returning(|_, buf, _| {
        buf[..3].copy_from_slice(&[0x03, 0x01, 0x15]);
        Ok(3)
    });
    match DsiCamera::new(mock) {
        Ok(_) => panic!("open must fail on a protocol violation"),
        Err(err) => assert!(matches!(err, Error::BadAck { got: 0x15 })),
    }
}
