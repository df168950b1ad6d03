//! Command codec for the Corsair Link register protocol.
//!
//! Every Corsair Link controller is a bank of registers that are read or written
//! with one of six opcodes. Two incompatible layouts exist:
//!
//! - **V1** (Cooling Node, H80, H100): one operation per transfer, and every fan
//!   or sensor channel has its own fixed register address.
//! - **V2** (H80i, H100i): a transfer packs up to three operations, typically a
//!   "select" write followed by a read or write of a shared register bank.
//!
//! The device echoes `[id, opcode]` for each operation of a transfer, followed
//! by the data of the read operation.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CorsairError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Corsair Vendor ID.
pub const CORSAIR_VID: u16 = 0x1B1C;

/// Corsair Link Commander / Cooling Node hub Product ID (V1 framing).
pub const COOLING_NODE_PID: u16 = 0x0C02;

/// H80i / H100i Product ID (V2 framing).
pub const H80I_PID: u16 = 0x0C04;

/// Size of the buffer used for reading replies.
pub const HID_REPORT_LENGTH: usize = 64;

/// V2 transfers are sent as a zero-padded report of this length.
pub const V2_REPORT_LENGTH: usize = 17;

/// First request id handed out, and the value the counter wraps back to.
pub const FIRST_REQUEST_ID: u8 = 0x81;

/// Position of the request id inside a length-prefixed frame.
/// The opcode of the same operation follows it.
pub const CORRELATION_OFFSET: usize = 1;

/// Maximum number of operations a V2 transfer carries.
pub const MAX_FRAME_OPERATIONS: usize = 3;

/// Fan mode byte: fan detected.
pub const FAN_PRESENT: u8 = 0x80;

/// Fan mode byte: 4-pin fan with tachometer.
pub const FAN_TACH: u8 = 0x01;

/// Fan mode byte: bits holding the operating mode.
pub const FAN_MODE_MASK: u8 = 0x0E;

// =============================================================================
// V1 Registers (Cooling Node)
// =============================================================================

pub const V1_DEVICE_ID: u8 = 0x00;
pub const V1_FIRMWARE_ID: u8 = 0x01;

/// Temperature ports, indexed by sensor number.
pub const V1_TEMP_READ: [u8; 4] = [0x0A, 0x09, 0x08, 0x07];

/// Measured RPM ports, indexed by fan number.
pub const V1_FAN_READ_RPM: [u8; 5] = [0x0B, 0x0C, 0x0D, 0x0E, 0x0F];

/// Maximum recorded RPM ports, indexed by fan number.
pub const V1_FAN_MAX_RPM: [u8; 5] = [0x10, 0x11, 0x12, 0x13, 0x14];

/// Fan mode ports, indexed by fan number.
pub const V1_FAN_MODE: [u8; 5] = [0x20, 0x30, 0x40, 0x50, 0x60];

/// Fixed RPM target ports, indexed by fan number.
pub const V1_FAN_FIXED_RPM: [u8; 5] = [0x22, 0x32, 0x42, 0x52, 0x62];

// =============================================================================
// V2 Registers (H80i / H100i)
// =============================================================================

pub const V2_DEVICE_ID: u8 = 0x00;
pub const V2_FIRMWARE_ID: u8 = 0x01;
pub const V2_TEMP_SELECT: u8 = 0x0C;
pub const V2_TEMP_COUNT: u8 = 0x0D;
pub const V2_TEMP_READ: u8 = 0x0E;
/// Fan select: 0-3 are fans, 4 is the pump on H80i/H100i.
pub const V2_FAN_SELECT: u8 = 0x10;
pub const V2_FAN_COUNT: u8 = 0x11;
pub const V2_FAN_MODE: u8 = 0x12;
pub const V2_FAN_FIXED_PWM: u8 = 0x13;
pub const V2_FAN_FIXED_RPM: u8 = 0x14;
pub const V2_FAN_READ_RPM: u8 = 0x16;
pub const V2_FAN_MAX_RPM: u8 = 0x17;

/// Number of fan slots the V2 select register accepts.
pub const V2_FAN_SLOTS: u8 = 6;

/// Number of sensor slots the V2 select register accepts.
pub const V2_TEMP_SLOTS: u8 = 4;

// =============================================================================
// Opcodes
// =============================================================================

/// Corsair Link operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `06 AA BB` - write BB into one-byte register AA.
    WriteOneByte,
    /// `07 AA` - read one-byte register AA.
    ReadOneByte,
    /// `08 AA BB CC` - write BB CC into two-byte register AA.
    WriteTwoBytes,
    /// `09 AA` - read two-byte register AA.
    ReadTwoBytes,
    /// `0A AA 03 00 11 22` - not supported by the Cooling Node.
    WriteThreeBytes,
    /// `0B AA 03` - not supported by the Cooling Node.
    ReadThreeBytes,
}

impl Opcode {
    /// Get the wire value of this opcode.
    pub const fn id(&self) -> u8 {
        match self {
            Opcode::WriteOneByte => 0x06,
            Opcode::ReadOneByte => 0x07,
            Opcode::WriteTwoBytes => 0x08,
            Opcode::ReadTwoBytes => 0x09,
            Opcode::WriteThreeBytes => 0x0A,
            Opcode::ReadThreeBytes => 0x0B,
        }
    }

    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Opcode::ReadOneByte | Opcode::ReadTwoBytes | Opcode::ReadThreeBytes
        )
    }

    /// Register width in bytes.
    pub const fn width(&self) -> usize {
        match self {
            Opcode::WriteOneByte | Opcode::ReadOneByte => 1,
            Opcode::WriteTwoBytes | Opcode::ReadTwoBytes => 2,
            Opcode::WriteThreeBytes | Opcode::ReadThreeBytes => 3,
        }
    }
}

// =============================================================================
// Protocol Variants
// =============================================================================

/// Register/frame layout spoken by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Variant {
    /// Cooling Node family.
    V1,
    /// H80i / H100i family.
    V2,
}

/// Logical register, resolved to addresses by [`Variant::read_commands`] and
/// [`Variant::write_commands`]. Channel numbers are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    DeviceId,
    FirmwareId,
    TempSensorCount,
    Temperature(u8),
    FanMode(u8),
    FanRpm(u8),
    FanMaxRpm(u8),
    FanFixedRpm(u8),
}

impl Register {
    /// Human readable register name for errors and logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Register::DeviceId => "device id",
            Register::FirmwareId => "firmware id",
            Register::TempSensorCount => "temperature sensor count",
            Register::Temperature(_) => "temperature",
            Register::FanMode(_) => "fan mode",
            Register::FanRpm(_) => "fan rpm",
            Register::FanMaxRpm(_) => "fan max rpm",
            Register::FanFixedRpm(_) => "fan fixed rpm",
        }
    }

    /// Whether a read-back value confirms that `requested` was written.
    ///
    /// Only the mode bits of a fan mode byte are compared; the device sets the
    /// presence, tach and temperature channel bits itself.
    pub const fn confirms(&self, requested: u16, actual: u16) -> bool {
        match self {
            Register::FanMode(_) => {
                (requested as u8 & FAN_MODE_MASK) == (actual as u8 & FAN_MODE_MASK)
            }
            _ => requested == actual,
        }
    }
}

fn port(table: &[u8], index: u8, register: Register) -> Result<u8> {
    table.get(index as usize).copied().ok_or_else(|| {
        CorsairError::InvalidArgument(format!(
            "{} channel {} out of range (0-{})",
            register.label(),
            index,
            table.len().saturating_sub(1)
        ))
    })
}

fn check_slot(index: u8, slots: u8, register: Register) -> Result<u8> {
    if index >= slots {
        return Err(CorsairError::InvalidArgument(format!(
            "{} channel {} out of range (0-{})",
            register.label(),
            index,
            slots - 1
        )));
    }
    Ok(index)
}

impl Variant {
    pub const fn name(&self) -> &'static str {
        match self {
            Variant::V1 => "V1",
            Variant::V2 => "V2",
        }
    }

    /// Offset of the read data inside a reply to a transfer of `operations`.
    pub const fn data_offset(&self, operations: usize) -> usize {
        match self {
            Variant::V1 => 2,
            Variant::V2 => 2 * operations,
        }
    }

    /// Writes are followed by a read-back in the same transfer.
    pub const fn verifies_writes(&self) -> bool {
        matches!(self, Variant::V2)
    }

    /// The number of temperature sensors is queried from the device rather
    /// than taken from the capability table.
    pub const fn counts_sensors(&self) -> bool {
        matches!(self, Variant::V2)
    }

    /// Derive fan presence from the values read for a channel.
    ///
    /// V1 devices drop the presence bit when a fan spins down in quiet or power
    /// save mode, so any sign of life counts there.
    pub const fn fan_present(&self, mode: u8, rpm: u16, max_rpm: u16) -> bool {
        match self {
            Variant::V1 => mode & (FAN_PRESENT | FAN_TACH) != 0 || rpm != 0 || max_rpm != 0,
            Variant::V2 => mode & FAN_PRESENT != 0,
        }
    }

    /// Derive sensor presence from a raw reading.
    ///
    /// V2 callers only read sensors below the reported count; the whole degree
    /// range check filters out unconnected probes on top of that.
    pub const fn temperature_present(&self, whole: u8, fraction: u8) -> bool {
        match self {
            Variant::V1 => whole != 0 || fraction != 0,
            Variant::V2 => whole >= 1 && whole < 120,
        }
    }

    /// Commands reading `register`. The last command carries the data.
    pub fn read_commands(&self, register: Register) -> Result<Vec<Command>> {
        match self {
            Variant::V1 => {
                let command = match register {
                    Register::DeviceId => Command::read_one(V1_DEVICE_ID),
                    Register::FirmwareId => Command::read_two(V1_FIRMWARE_ID),
                    Register::Temperature(i) => Command::read_two(port(&V1_TEMP_READ, i, register)?),
                    // Mode ports are read two bytes wide, the mode is the low byte.
                    Register::FanMode(i) => Command::read_two(port(&V1_FAN_MODE, i, register)?),
                    Register::FanRpm(i) => Command::read_two(port(&V1_FAN_READ_RPM, i, register)?),
                    Register::FanMaxRpm(i) => Command::read_two(port(&V1_FAN_MAX_RPM, i, register)?),
                    Register::FanFixedRpm(i) => {
                        Command::read_two(port(&V1_FAN_FIXED_RPM, i, register)?)
                    }
                    Register::TempSensorCount => {
                        return Err(CorsairError::InvalidArgument(
                            "V1 devices have no temperature sensor count register".into(),
                        ));
                    }
                };
                Ok(vec![command])
            }
            Variant::V2 => Ok(match register {
                Register::DeviceId => vec![Command::read_one(V2_DEVICE_ID)],
                Register::FirmwareId => vec![Command::read_two(V2_FIRMWARE_ID)],
                Register::TempSensorCount => vec![Command::read_one(V2_TEMP_COUNT)],
                Register::Temperature(i) => vec![
                    Command::write_one(V2_TEMP_SELECT, check_slot(i, V2_TEMP_SLOTS, register)?),
                    Command::read_two(V2_TEMP_READ),
                ],
                Register::FanMode(i) => vec![
                    Command::write_one(V2_FAN_SELECT, check_slot(i, V2_FAN_SLOTS, register)?),
                    Command::read_one(V2_FAN_MODE),
                ],
                Register::FanRpm(i) => vec![
                    Command::write_one(V2_FAN_SELECT, check_slot(i, V2_FAN_SLOTS, register)?),
                    Command::read_two(V2_FAN_READ_RPM),
                ],
                Register::FanMaxRpm(i) => vec![
                    Command::write_one(V2_FAN_SELECT, check_slot(i, V2_FAN_SLOTS, register)?),
                    Command::read_two(V2_FAN_MAX_RPM),
                ],
                Register::FanFixedRpm(i) => vec![
                    Command::write_one(V2_FAN_SELECT, check_slot(i, V2_FAN_SLOTS, register)?),
                    Command::read_two(V2_FAN_FIXED_RPM),
                ],
            }),
        }
    }

    /// Commands writing `value` into `register`.
    ///
    /// On V2 the written register is read back in the same transfer.
    pub fn write_commands(&self, register: Register, value: u16) -> Result<Vec<Command>> {
        match (self, register) {
            (Variant::V1, Register::FanMode(i)) => Ok(vec![Command::write_one(
                port(&V1_FAN_MODE, i, register)?,
                value as u8,
            )]),
            (Variant::V1, Register::FanFixedRpm(i)) => Ok(vec![Command::write_two(
                port(&V1_FAN_FIXED_RPM, i, register)?,
                value,
            )]),
            (Variant::V2, Register::FanMode(i)) => Ok(vec![
                Command::write_one(V2_FAN_SELECT, check_slot(i, V2_FAN_SLOTS, register)?),
                Command::write_one(V2_FAN_MODE, value as u8),
                Command::read_one(V2_FAN_MODE),
            ]),
            (Variant::V2, Register::FanFixedRpm(i)) => Ok(vec![
                Command::write_one(V2_FAN_SELECT, check_slot(i, V2_FAN_SLOTS, register)?),
                Command::write_two(V2_FAN_FIXED_RPM, value),
                Command::read_two(V2_FAN_FIXED_RPM),
            ]),
            _ => Err(CorsairError::InvalidArgument(format!(
                "{} is read-only",
                register.label()
            ))),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Commands
// =============================================================================

/// A single register operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    register: u8,
    data: Vec<u8>,
}

impl Command {
    pub fn read_one(register: u8) -> Self {
        Self {
            opcode: Opcode::ReadOneByte,
            register,
            data: Vec::new(),
        }
    }

    pub fn read_two(register: u8) -> Self {
        Self {
            opcode: Opcode::ReadTwoBytes,
            register,
            data: Vec::new(),
        }
    }

    pub fn write_one(register: u8, value: u8) -> Self {
        Self {
            opcode: Opcode::WriteOneByte,
            register,
            data: vec![value],
        }
    }

    pub fn write_two(register: u8, value: u16) -> Self {
        let mut data = vec![0u8; 2];
        LittleEndian::write_u16(&mut data, value);
        Self {
            opcode: Opcode::WriteTwoBytes,
            register,
            data,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn register(&self) -> u8 {
        self.register
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes this operation occupies in a frame.
    fn encoded_len(&self) -> usize {
        3 + self.data.len()
    }

    fn encode_into(&self, request_id: u8, buf: &mut Vec<u8>) {
        buf.push(request_id);
        buf.push(self.opcode.id());
        buf.push(self.register);
        buf.extend_from_slice(&self.data);
    }
}

// =============================================================================
// Request Ids
// =============================================================================

/// Monotonic request id counter.
///
/// Ids run from [`FIRST_REQUEST_ID`] to `0xFF` and then wrap back, so an id is
/// never `0x00` and never looks like a register address or opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIds {
    next: u8,
}

impl RequestIds {
    pub fn new() -> Self {
        Self {
            next: FIRST_REQUEST_ID,
        }
    }

    /// Start counting at `id`, clamped into the valid range.
    pub fn starting_at(id: u8) -> Self {
        Self {
            next: id.max(FIRST_REQUEST_ID),
        }
    }

    /// The id the next call to [`RequestIds::next_id`] returns.
    pub fn peek(&self) -> u8 {
        self.next
    }

    pub fn next_id(&mut self) -> u8 {
        let id = self.next;
        self.next = if id == u8::MAX {
            FIRST_REQUEST_ID
        } else {
            id + 1
        };
        id
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Frames
// =============================================================================

fn wire_form(variant: Variant, frame: &[u8]) -> Vec<u8> {
    match variant {
        // The Cooling Node does not take the length byte.
        Variant::V1 => frame[1..].to_vec(),
        Variant::V2 => {
            let mut report = frame.to_vec();
            if report.len() < V2_REPORT_LENGTH {
                report.resize(V2_REPORT_LENGTH, 0);
            }
            report
        }
    }
}

/// Encode a single operation into the bytes sent on the wire for `variant`.
///
/// The frame is `[length, request_id, opcode, register, data...]`; V1 drops
/// the length byte and V2 pads the report with zeros.
pub fn encode(variant: Variant, request_id: u8, command: &Command) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + command.encoded_len());
    frame.push(command.encoded_len() as u8);
    command.encode_into(request_id, &mut frame);
    wire_form(variant, &frame)
}

/// Decode a little-endian value of `width` bytes at `offset`.
///
/// A reply too short for the value is an error, never a silent zero.
pub fn decode(response: &[u8], offset: usize, width: usize) -> Result<u16> {
    let end = offset + width;
    if response.len() < end {
        return Err(CorsairError::MalformedResponse {
            message: format!(
                "reply has {} bytes, expected at least {}",
                response.len(),
                end
            ),
        });
    }

    match width {
        1 => Ok(response[offset] as u16),
        2 => Ok(LittleEndian::read_u16(&response[offset..end])),
        _ => Err(CorsairError::InvalidArgument(format!(
            "unsupported register width {}",
            width
        ))),
    }
}

/// An encoded transfer, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    variant: Variant,
    bytes: Vec<u8>,
    wire: Vec<u8>,
    operations: usize,
    read_width: usize,
}

impl Frame {
    /// Encode `commands` into one transfer, taking one request id per command.
    ///
    /// V1 carries exactly one command. Only the last command of a frame may be
    /// a read, since the reply holds a single data field.
    pub fn encode(variant: Variant, ids: &mut RequestIds, commands: &[Command]) -> Result<Self> {
        let max = match variant {
            Variant::V1 => 1,
            Variant::V2 => MAX_FRAME_OPERATIONS,
        };
        if commands.is_empty() || commands.len() > max {
            return Err(CorsairError::InvalidArgument(format!(
                "{} frames carry 1-{} operations, got {}",
                variant,
                max,
                commands.len()
            )));
        }
        if commands[..commands.len() - 1]
            .iter()
            .any(|c| c.opcode().is_read())
        {
            return Err(CorsairError::InvalidArgument(
                "only the last operation of a frame may read".into(),
            ));
        }

        let length: usize = commands.iter().map(Command::encoded_len).sum();
        let mut bytes = Vec::with_capacity(1 + length);
        bytes.push(length as u8);
        for command in commands {
            command.encode_into(ids.next_id(), &mut bytes);
        }

        let last = &commands[commands.len() - 1];
        let read_width = if last.opcode().is_read() {
            last.opcode().width()
        } else {
            0
        };

        Ok(Self {
            variant,
            wire: wire_form(variant, &bytes),
            bytes,
            operations: commands.len(),
            read_width,
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Length-prefixed frame.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes actually written to the transport.
    pub fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// Id of the first operation; the device echoes it at reply byte 0.
    pub fn request_id(&self) -> u8 {
        self.bytes[CORRELATION_OFFSET]
    }

    /// Opcode of the first operation; the device echoes it at reply byte 1.
    pub fn opcode(&self) -> u8 {
        self.bytes[CORRELATION_OFFSET + 1]
    }

    pub fn operations(&self) -> usize {
        self.operations
    }

    pub fn data_offset(&self) -> usize {
        self.variant.data_offset(self.operations)
    }

    /// Whether the reply carries data.
    pub fn reads(&self) -> bool {
        self.read_width > 0
    }

    /// Shortest reply that can answer this frame.
    pub fn response_len(&self) -> usize {
        self.data_offset().max(2) + self.read_width
    }

    /// Decode the value read by the last operation.
    pub fn decode(&self, response: &[u8]) -> Result<u16> {
        if !self.reads() {
            return Err(CorsairError::InvalidArgument(
                "frame does not read a register".into(),
            ));
        }
        decode(response, self.data_offset(), self.read_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reply echoing every operation of `frame` followed by `data`.
    fn reply_for(frame: &Frame, data: &[u8]) -> Vec<u8> {
        let bytes = frame.bytes();
        let mut reply = Vec::new();
        let mut pos = 1;
        while pos < bytes.len() {
            reply.push(bytes[pos]);
            reply.push(bytes[pos + 1]);
            let op = bytes[pos + 1];
            let data_len = match op {
                0x06 => 1,
                0x08 => 2,
                _ => 0,
            };
            pos += 3 + data_len;
        }
        reply.extend_from_slice(data);
        reply
    }

    #[test]
    fn test_opcode_ids() {
        assert_eq!(Opcode::WriteOneByte.id(), 0x06);
        assert_eq!(Opcode::ReadOneByte.id(), 0x07);
        assert_eq!(Opcode::WriteTwoBytes.id(), 0x08);
        assert_eq!(Opcode::ReadTwoBytes.id(), 0x09);
        assert_eq!(Opcode::WriteThreeBytes.id(), 0x0A);
        assert_eq!(Opcode::ReadThreeBytes.id(), 0x0B);
    }

    #[test]
    fn test_encode_single_operation() {
        let v1 = encode(Variant::V1, 0x81, &Command::read_one(V1_DEVICE_ID));
        assert_eq!(v1, vec![0x81, 0x07, 0x00]);

        let v2 = encode(Variant::V2, 0x81, &Command::read_one(V2_DEVICE_ID));
        assert_eq!(v2.len(), V2_REPORT_LENGTH);
        assert_eq!(&v2[..4], &[0x03, 0x81, 0x07, 0x00]);
        assert!(v2[4..].iter().all(|&b| b == 0));

        let write = encode(Variant::V1, 0x90, &Command::write_two(0x22, 1200));
        assert_eq!(write, vec![0x90, 0x08, 0x22, 0xB0, 0x04]);
    }

    #[test]
    fn test_v2_select_and_read_frame() {
        let mut ids = RequestIds::new();
        let commands = Variant::V2.read_commands(Register::Temperature(0)).unwrap();
        let frame = Frame::encode(Variant::V2, &mut ids, &commands).unwrap();

        assert_eq!(
            frame.bytes(),
            &[0x07, 0x81, 0x06, 0x0C, 0x00, 0x82, 0x09, 0x0E]
        );
        assert_eq!(frame.request_id(), 0x81);
        assert_eq!(frame.opcode(), 0x06);
        assert_eq!(frame.data_offset(), 4);
        assert_eq!(frame.response_len(), 6);
        assert_eq!(ids.peek(), 0x83);
    }

    #[test]
    fn test_v2_set_mode_frame_reads_back() {
        let mut ids = RequestIds::new();
        let commands = Variant::V2
            .write_commands(Register::FanMode(1), 0x08)
            .unwrap();
        let frame = Frame::encode(Variant::V2, &mut ids, &commands).unwrap();

        assert_eq!(
            frame.bytes(),
            &[0x0B, 0x81, 0x06, 0x10, 0x01, 0x82, 0x06, 0x12, 0x08, 0x83, 0x07, 0x12]
        );
        assert_eq!(frame.data_offset(), 6);
        assert!(frame.reads());
    }

    #[test]
    fn test_v1_frame_is_single_operation() {
        let mut ids = RequestIds::new();
        let commands = [Command::read_two(0x0B), Command::read_two(0x0C)];
        let err = Frame::encode(Variant::V1, &mut ids, &commands).unwrap_err();
        assert!(matches!(err, CorsairError::InvalidArgument(_)));

        let commands = Variant::V1
            .write_commands(Register::FanMode(2), 0x06)
            .unwrap();
        let frame = Frame::encode(Variant::V1, &mut ids, &commands).unwrap();
        assert_eq!(frame.bytes(), &[0x04, 0x81, 0x06, 0x40, 0x06]);
        assert_eq!(frame.wire_bytes(), &[0x81, 0x06, 0x40, 0x06]);
        assert!(!frame.reads());
        assert_eq!(frame.response_len(), 2);
    }

    #[test]
    fn test_read_must_be_last() {
        let mut ids = RequestIds::new();
        let commands = [Command::read_one(0x12), Command::write_one(0x10, 0)];
        assert!(Frame::encode(Variant::V2, &mut ids, &commands).is_err());
    }

    #[test]
    fn test_request_ids_wrap() {
        let mut ids = RequestIds::starting_at(0xFE);
        assert_eq!(ids.next_id(), 0xFE);
        assert_eq!(ids.next_id(), 0xFF);
        assert_eq!(ids.next_id(), FIRST_REQUEST_ID);

        let mut ids = RequestIds::starting_at(0x00);
        for _ in 0..1000 {
            let id = ids.next_id();
            assert!(id >= FIRST_REQUEST_ID);
        }
    }

    #[test]
    fn test_read_round_trip_both_variants() {
        for variant in [Variant::V1, Variant::V2] {
            let mut ids = RequestIds::new();
            let commands = variant.read_commands(Register::FanRpm(2)).unwrap();
            let frame = Frame::encode(variant, &mut ids, &commands).unwrap();
            let reply = reply_for(&frame, &[0x2C, 0x04]);
            assert_eq!(frame.decode(&reply).unwrap(), 1068, "{}", variant);
        }
    }

    #[test]
    fn test_decode_short_reply() {
        let err = decode(&[0x81, 0x09, 0x2C], 2, 2).unwrap_err();
        assert!(matches!(err, CorsairError::MalformedResponse { .. }));
        assert_eq!(decode(&[0x81, 0x07, 0x3C], 2, 1).unwrap(), 0x3C);
    }

    #[test]
    fn test_register_tables() {
        let commands = Variant::V1.read_commands(Register::Temperature(0)).unwrap();
        assert_eq!(commands, vec![Command::read_two(0x0A)]);
        let commands = Variant::V1.read_commands(Register::FanMaxRpm(4)).unwrap();
        assert_eq!(commands, vec![Command::read_two(0x14)]);

        assert!(Variant::V1.read_commands(Register::FanRpm(5)).is_err());
        assert!(Variant::V1.read_commands(Register::TempSensorCount).is_err());
        assert!(Variant::V2.read_commands(Register::FanRpm(6)).is_err());
        assert!(Variant::V2.write_commands(Register::FanRpm(0), 100).is_err());
    }

    #[test]
    fn test_fan_presence() {
        // V1: any sign of life
        assert!(Variant::V1.fan_present(0x00, 0, 1500));
        assert!(Variant::V1.fan_present(0x01, 0, 0));
        assert!(!Variant::V1.fan_present(0x08, 0, 0));
        // V2: presence bit only
        assert!(Variant::V2.fan_present(0x86, 0, 0));
        assert!(!Variant::V2.fan_present(0x06, 900, 1200));
    }

    #[test]
    fn test_temperature_presence() {
        assert!(Variant::V1.temperature_present(0, 0x80));
        assert!(!Variant::V1.temperature_present(0, 0));
        assert!(Variant::V2.temperature_present(31, 0));
        assert!(!Variant::V2.temperature_present(0, 0x40));
        assert!(!Variant::V2.temperature_present(120, 0));
    }

    #[test]
    fn test_mode_confirmation_ignores_status_bits() {
        let register = Register::FanMode(0);
        assert!(register.confirms(0x08, 0x88));
        assert!(register.confirms(0x08, 0x09));
        assert!(!register.confirms(0x08, 0x86));
        assert!(Register::FanFixedRpm(0).confirms(1200, 1200));
        assert!(!Register::FanFixedRpm(0).confirms(1200, 1100));
    }
}
