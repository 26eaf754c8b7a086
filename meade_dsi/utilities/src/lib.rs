//! Test support for the `meade_dsi` driver: a mockall mock of the
//! transport seam and a protocol-accurate simulated camera for tests
//! that need the whole bring-up dialogue to work.

use meade_dsi::command::Command;
use meade_dsi::eeprom;
use meade_dsi::protocol::ACK;
use meade_dsi::transport::{
    Transport, TransportError, EP_COMMAND_IN, EP_COMMAND_OUT, EP_IMAGE_IN,
};
use mockall::mock;
use std::collections::VecDeque;
use std::time::Duration;

mock! {
    pub Transport {}

    impl Transport for Transport {
        fn bulk_write(
            &mut self,
            endpoint: u8,
            bytes: &[u8],
            timeout: Duration,
        ) -> Result<usize, TransportError>;

        fn bulk_read(
            &mut self,
            endpoint: u8,
            buf: &mut [u8],
            timeout: Duration,
        ) -> Result<usize, TransportError>;
    }
}

/// A fake DSI camera behind the transport seam.
///
/// Decodes each request frame, executes it against a small register file
/// and an in-memory EEPROM, and queues a well-formed reply. Image reads
/// serve the configured half-frames, even first. Panics on malformed
/// traffic, which in a test is exactly what you want.
pub struct SimCamera {
    eeprom: Vec<u8>,
    replies: VecDeque<Vec<u8>>,
    /// Every command executed, with its decoded parameter, in order.
    pub log: Vec<(Command, u32)>,
    /// Sequence numbers seen, in order.
    pub seqs: Vec<u8>,
    pub even_frame: Vec<u8>,
    pub odd_frame: Vec<u8>,
    next_half: usize,
    /// Served by GET_EXP_TIMER_COUNT, then reset to zero so a polling
    /// reader finishes after one round.
    pub ticks_left: u32,
    pub temperature_raw: u32,
    /// When set, image-endpoint reads fail with a timeout.
    pub fail_image_reads: bool,

    gain: u32,
    offset: u32,
    exp_time: u32,
    exp_mode: u32,
    vdd_mode: u32,
    flush_mode: u32,
    clean_mode: u32,
    readout_speed: u32,
    readout_mode: u32,
    readout_delay: u32,
    row_count_even: u32,
    row_count_odd: u32,
}

impl SimCamera {
    pub fn new(chip: &str) -> SimCamera {
        let mut rom = vec![eeprom::FILL; 64];
        rom[..8].copy_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        rom[8..28].copy_from_slice(&eeprom::encode_string(chip, 20));
        rom[0x1c..0x3c].copy_from_slice(&eeprom::encode_string("DSI1", 0x20));
        SimCamera {
            eeprom: rom,
            replies: VecDeque::new(),
            log: Vec::new(),
            seqs: Vec::new(),
            even_frame: Vec::new(),
            odd_frame: Vec::new(),
            next_half: 0,
            ticks_left: 0,
            temperature_raw: 500,
            fail_image_reads: false,
            gain: 0,
            offset: 0,
            exp_time: 0,
            exp_mode: 0,
            vdd_mode: 0,
            flush_mode: 0,
            clean_mode: 0,
            readout_speed: 0,
            readout_mode: 0,
            readout_delay: 0,
            row_count_even: 0,
            row_count_odd: 0,
        }
    }

    pub fn with_frames(chip: &str, even_frame: Vec<u8>, odd_frame: Vec<u8>) -> SimCamera {
        let mut sim = SimCamera::new(chip);
        sim.even_frame = even_frame;
        sim.odd_frame = odd_frame;
        sim
    }

    /// Commands executed so far, without parameters.
    pub fn commands(&self) -> Vec<Command> {
        self.log.iter().map(|(command, _)| *command).collect()
    }

    fn execute(&mut self, command: Command, param: u32) -> u32 {
        use Command::*;
        match command {
            Ping | Reset | Abort | Trigger | ClearTs | PsOn | PsOff | CcdVddOn | CcdVddOff
            | TestPattern | EraseEeprom | SetEepromVidPid => 0,
            GetVersion => 0x0001_010a,
            GetStatus => 0x0000_0001,
            GetTimestamp => 0,
            GetEepromLength => self.eeprom.len() as u32,
            GetEepromByte => u32::from(self.eeprom[param as usize]),
            SetEepromByte => {
                self.eeprom[(param & 0xff) as usize] = (param >> 8) as u8;
                0
            }
            GetGain => self.gain,
            SetGain => {
                self.gain = param;
                0
            }
            GetOffset => self.offset,
            SetOffset => {
                self.offset = param;
                0
            }
            GetExpTime => self.exp_time,
            SetExpTime => {
                self.exp_time = param;
                0
            }
            GetExpMode => self.exp_mode,
            SetExpMode => {
                self.exp_mode = param;
                0
            }
            GetVddMode => self.vdd_mode,
            SetVddMode => {
                self.vdd_mode = param;
                0
            }
            GetFlushMode => self.flush_mode,
            SetFlushMode => {
                self.flush_mode = param;
                0
            }
            GetCleanMode => self.clean_mode,
            SetCleanMode => {
                self.clean_mode = param;
                0
            }
            GetReadoutSpeed => self.readout_speed,
            SetReadoutSpeed => {
                self.readout_speed = param;
                0
            }
            GetReadoutMode => self.readout_mode,
            SetReadoutMode => {
                self.readout_mode = param;
                0
            }
            GetReadoutDelay => self.readout_delay,
            SetReadoutDelay => {
                self.readout_delay = param;
                0
            }
            GetRowCountEven => self.row_count_even,
            SetRowCountEven => {
                self.row_count_even = param;
                0
            }
            GetRowCountOdd => self.row_count_odd,
            SetRowCountOdd => {
                self.row_count_odd = param;
                0
            }
            GetTemp => self.temperature_raw,
            GetExpTimerCount => {
                let ticks = self.ticks_left;
                self.ticks_left = 0;
                ticks
            }
            AdRead | AdWrite | GetDebugValue | GetEepromVidPid => 0,
        }
    }
}

impl Transport for SimCamera {
    fn bulk_write(
        &mut self,
        endpoint: u8,
        bytes: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        assert_eq!(endpoint, EP_COMMAND_OUT, "commands go out on endpoint 0x01");
        assert_eq!(
            usize::from(bytes[0]),
            bytes.len(),
            "length byte disagrees with transfer size"
        );
        let seq = bytes[1];
        let command = Command::from_code(bytes[2]).expect("unknown command code");
        let width = command.param_width();
        assert_eq!(bytes.len(), 3 + width.bytes(), "bad frame for {command:?}");
        let mut param_bytes = [0u8; 4];
        param_bytes[..width.bytes()].copy_from_slice(&bytes[3..3 + width.bytes()]);
        let param = u32::from_le_bytes(param_bytes);

        self.seqs.push(seq);
        self.log.push((command, param));
        let value = self.execute(command, param);

        let result_width = command.reply_width();
        let mut reply = vec![(3 + result_width.bytes()) as u8, seq, ACK];
        reply.extend_from_slice(&value.to_le_bytes()[..result_width.bytes()]);
        self.replies.push_back(reply);
        Ok(bytes.len())
    }

    fn bulk_read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        match endpoint {
            EP_COMMAND_IN => {
                let reply = self
                    .replies
                    .pop_front()
                    .expect("reply read with no command pending");
                buf[..reply.len()].copy_from_slice(&reply);
                Ok(reply.len())
            }
            EP_IMAGE_IN => {
                if self.fail_image_reads {
                    return Err(TransportError::Timeout);
                }
                let data = if self.next_half % 2 == 0 {
                    &self.even_frame
                } else {
                    &self.odd_frame
                };
                self.next_half += 1;
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            other => panic!("read from unexpected endpoint {other:#04x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meade_dsi::command::Width;
    use meade_dsi::protocol::decode_reply;

    #[test]
    fn replies_are_well_formed() {
        let mut sim = SimCamera::new("ICX254AL");
        // GET_VERSION, seq 1
        sim.bulk_write(EP_COMMAND_OUT, &[0x03, 0x01, 0x14], Duration::ZERO)
            .unwrap();
        let mut buf = [0u8; 64];
        let n = sim
            .bulk_read(EP_COMMAND_IN, &mut buf, Duration::ZERO)
            .unwrap();
        let value = decode_reply(&buf[..n], 0x01, Width::DWord).unwrap();
        assert_eq!(value, 0x0001_010a);
    }

    #[test]
    fn eeprom_holds_chip_name() {
        let mut sim = SimCamera::new("ICX254AL");
        // GET_EEPROM_BYTE at offset 9: first content byte of the chip name
        sim.bulk_write(EP_COMMAND_OUT, &[0x04, 0x01, 0x1f, 0x09], Duration::ZERO)
            .unwrap();
        let mut buf = [0u8; 64];
        let n = sim
            .bulk_read(EP_COMMAND_IN, &mut buf, Duration::ZERO)
            .unwrap();
        let value = decode_reply(&buf[..n], 0x01, Width::Byte).unwrap();
        assert_eq!(value, u32::from(b'I'));
    }
}
