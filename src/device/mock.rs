//! Simulated Corsair Link controller for tests.
//!
//! Executes the register operations of every written frame against an in-memory
//! register bank and queues the reply the real device would send. Test hooks
//! inject stale frames, hold replies back, garble writes and break the channel.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};

use crate::device::transport::Transport;
use crate::error::{CorsairError, Result};
use crate::protocol::*;

#[derive(Debug)]
struct SimState {
    variant: Variant,
    registers: HashMap<(u8, u8), u16>,
    fan_select: u8,
    temp_select: u8,
    replies: VecDeque<Vec<u8>>,
    held: Vec<Vec<u8>>,
    hold: usize,
    written: Vec<Vec<u8>>,
    garble_writes: bool,
    short_writes: bool,
    read_error: Option<String>,
}

impl SimState {
    fn key(&self, register: u8) -> (u8, u8) {
        match self.variant {
            Variant::V1 => (register, 0),
            Variant::V2 => match register {
                V2_FAN_MODE..=V2_FAN_MAX_RPM => (register, self.fan_select),
                V2_TEMP_READ | 0x0F => (register, self.temp_select),
                _ => (register, 0),
            },
        }
    }

    fn store(&mut self, register: u8, value: u16) {
        if self.variant == Variant::V2 {
            match register {
                V2_FAN_SELECT => {
                    self.fan_select = value as u8;
                    return;
                }
                V2_TEMP_SELECT => {
                    self.temp_select = value as u8;
                    return;
                }
                _ => {}
            }
        }

        let value = if self.garble_writes { value ^ 0x000E } else { value };
        let key = self.key(register);
        let value = if self.variant == Variant::V2 && register == V2_FAN_MODE {
            // Presence and tach bits belong to the device.
            let old = self.registers.get(&key).copied().unwrap_or(0);
            (old & !(FAN_MODE_MASK as u16)) | (value & FAN_MODE_MASK as u16)
        } else {
            value
        };
        self.registers.insert(key, value);
    }

    fn load(&self, register: u8) -> u16 {
        self.registers
            .get(&self.key(register))
            .copied()
            .unwrap_or(0)
    }

    /// Run every operation of a wire frame and build the reply.
    fn execute(&mut self, wire: &[u8]) -> Result<Vec<u8>> {
        let ops = match self.variant {
            Variant::V1 => wire.to_vec(),
            Variant::V2 => {
                let len = *wire.first().unwrap_or(&0) as usize;
                wire.get(1..1 + len)
                    .ok_or_else(|| CorsairError::Transport("truncated frame".into()))?
                    .to_vec()
            }
        };

        let mut reply = Vec::new();
        let mut data = Vec::new();
        let mut pos = 0;
        while pos + 3 <= ops.len() {
            let (id, op, register) = (ops[pos], ops[pos + 1], ops[pos + 2]);
            reply.push(id);
            reply.push(op);
            pos += 3;
            match op {
                0x06 => {
                    self.store(register, ops[pos] as u16);
                    pos += 1;
                }
                0x08 => {
                    self.store(register, LittleEndian::read_u16(&ops[pos..pos + 2]));
                    pos += 2;
                }
                0x07 => data = vec![self.load(register) as u8],
                0x09 => data = self.load(register).to_le_bytes().to_vec(),
                other => {
                    return Err(CorsairError::Transport(format!(
                        "unsupported opcode {:#04x}",
                        other
                    )));
                }
            }
        }
        reply.extend_from_slice(&data);
        Ok(reply)
    }
}

/// Cloneable handle; clones share one device.
#[derive(Debug, Clone)]
pub struct SimulatedCooler {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedCooler {
    pub fn new(variant: Variant, identity: u8) -> Self {
        let sim = Self {
            state: Arc::new(Mutex::new(SimState {
                variant,
                registers: HashMap::new(),
                fan_select: 0,
                temp_select: 0,
                replies: VecDeque::new(),
                held: Vec::new(),
                hold: 0,
                written: Vec::new(),
                garble_writes: false,
                short_writes: false,
                read_error: None,
            })),
        };
        sim.set(0x00, 0, identity as u16);
        sim.set(0x01, 0, 0x1005);
        sim
    }

    /// H100i: four fan slots (fan 4 unplugged), pump at index 4, one sensor.
    pub fn h100i() -> Self {
        let sim = Self::new(Variant::V2, 0x3C);
        sim.set(V2_TEMP_COUNT, 0, 1);
        sim.set(V2_TEMP_READ, 0, 0x1F80);
        for (fan, mode, rpm, max) in [
            (0, 0x86, 900, 1500),
            (1, 0x8B, 1100, 1600),
            (2, 0x88, 700, 1400),
            (3, 0x06, 0, 0),
            (4, 0x8C, 1068, 2100),
        ] {
            sim.set(V2_FAN_MODE, fan, mode);
            sim.set(V2_FAN_READ_RPM, fan, rpm);
            sim.set(V2_FAN_MAX_RPM, fan, max);
        }
        sim
    }

    /// Cooling Node: five fans (fan 5 unplugged), sensors 1 and 3 connected.
    pub fn cooling_node() -> Self {
        let sim = Self::new(Variant::V1, 0x38);
        sim.set(V1_TEMP_READ[0], 0, 0x1E40);
        sim.set(V1_TEMP_READ[2], 0, 0x2380);
        for (fan, mode, rpm, max) in [
            (0, 0x81, 1200, 1800),
            (1, 0x06, 800, 1000),
            // quiet mode spin-down: bits cleared, max rpm remembered
            (2, 0x08, 0, 1200),
            (3, 0x81, 950, 1300),
            (4, 0x00, 0, 0),
        ] {
            sim.set(V1_FAN_MODE[fan], 0, mode);
            sim.set(V1_FAN_READ_RPM[fan], 0, rpm);
            sim.set(V1_FAN_MAX_RPM[fan], 0, max);
        }
        sim
    }

    pub fn set(&self, register: u8, selector: u8, value: u16) {
        self.state
            .lock()
            .unwrap()
            .registers
            .insert((register, selector), value);
    }

    pub fn get(&self, register: u8, selector: u8) -> u16 {
        self.state
            .lock()
            .unwrap()
            .registers
            .get(&(register, selector))
            .copied()
            .unwrap_or(0)
    }

    /// Queue a frame ahead of any reply still to come.
    pub fn push_reply(&self, frame: Vec<u8>) {
        self.state.lock().unwrap().replies.push_back(frame);
    }

    /// Keep the replies to the next `count` frames back.
    pub fn hold_replies(&self, count: usize) {
        self.state.lock().unwrap().hold = count;
    }

    /// Deliver held replies late.
    pub fn release_held(&self) {
        let mut state = self.state.lock().unwrap();
        let held: Vec<_> = state.held.drain(..).collect();
        state.replies.extend(held);
    }

    /// Store something other than the written value.
    pub fn garble_writes(&self, garble: bool) {
        self.state.lock().unwrap().garble_writes = garble;
    }

    pub fn short_writes(&self, short: bool) {
        self.state.lock().unwrap().short_writes = short;
    }

    pub fn fail_reads(&self, message: &str) {
        self.state.lock().unwrap().read_error = Some(message.to_string());
    }

    /// Frames written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().written.clone()
    }
}

impl Transport for SimulatedCooler {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.written.push(bytes.to_vec());
        if state.short_writes {
            return Ok(bytes.len() - 1);
        }

        let reply = state.execute(bytes)?;
        if state.hold > 0 {
            state.hold -= 1;
            state.held.push(reply);
        } else {
            state.replies.push_back(reply);
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(message) = &state.read_error {
                return Err(CorsairError::Transport(message.clone()));
            }
            if let Some(reply) = state.replies.pop_front() {
                let n = reply.len().min(buf.len());
                buf[..n].copy_from_slice(&reply[..n]);
                return Ok(n);
            }
        }

        if !timeout.is_zero() {
            thread::sleep(timeout.min(Duration::from_millis(5)));
        }
        Ok(0)
    }
}
