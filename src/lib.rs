//! # IC Tester Core
//!
//! This library contains the test-execution engine of a serial-controlled IC
//! tester: a host configures which pins of three 8-bit banks are wired to a
//! device under test (DUT), uploads a sequence of test vectors, and triggers
//! execution. The engine drives and samples the banks through a [`Bus`]
//! capability and answers with the same single-byte verdicts the hardware
//! tester sends, so the full binary protocol can be exercised against the
//! simulated DUT wirings shipped in this crate.

use std::fmt;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

// Errors raised by the command channel itself. A detected test mismatch is
// not an error; it is the `Fail` reply.
#[derive(Debug)]
pub enum ProtocolError {
    /// The channel reached end of stream in the middle of a command.
    ChannelClosed,
    /// Transport failure underneath the byte channel.
    Io(io::Error),
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ProtocolError::ChannelClosed
        } else {
            ProtocolError::Io(err)
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::ChannelClosed => write!(f, "command channel closed mid-command"),
            ProtocolError::Io(err) => write!(f, "channel I/O error: {}", err),
        }
    }
}

// Command opcodes, carried in the top 3 bits of the first byte of each
// command. The low 5 bits are unused.
pub const CMD_SETUP: u8 = 0;
pub const CMD_UPLOAD: u8 = 1;
pub const CMD_RUN: u8 = 2;

/// Single-byte verdicts sent back over the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Command accepted and state updated.
    Ok = 0,
    /// Unrecognized or malformed command; state untouched.
    Err = 1,
    /// The test ran to completion without a mismatch.
    Pass = 2,
    /// The test detected a mismatch. A valid test outcome, not a fault.
    Fail = 3,
}

impl Response {
    pub fn from_wire(byte: u8) -> Option<Response> {
        match byte {
            0 => Some(Response::Ok),
            1 => Some(Response::Err),
            2 => Some(Response::Pass),
            3 => Some(Response::Fail),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Response::Ok => "OK",
            Response::Err => "ERR",
            Response::Pass => "PASS",
            Response::Fail => "FAIL",
        };
        write!(f, "{}", name)
    }
}

/// DUT class of an uploaded test, selecting the execution engine and the
/// sampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
    /// Outputs are a pure function of the current vector; every vector is
    /// checked.
    Combinational = 0,
    /// Even vectors set up state and clock transitions, odd vectors carry
    /// the settled state to verify; only odd positions are checked.
    Sequential = 1,
    /// DRAM-style part driven by the dedicated memory engine; the vector
    /// sequence is ignored.
    Memory = 2,
}

impl TestType {
    pub fn from_wire(byte: u8) -> Option<TestType> {
        match byte {
            0 => Some(TestType::Combinational),
            1 => Some(TestType::Sequential),
            2 => Some(TestType::Memory),
            _ => None,
        }
    }
}

/// Number of 8-bit pin banks wired to the DUT socket.
pub const BANKS: usize = 3;

/// Per-bank wiring description: which of the eight pins are connected to the
/// DUT at all, which of those the tester drives (DUT inputs), and the idle
/// level applied to DUT-driven pins between samples.
///
/// Only bits set in `used` ever reach the physical port; everything else is
/// left floating.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PinBank {
    pub used: u8,
    pub direction: u8,
    pub idle_pull: u8,
}

/// Upper bound on the number of vectors in a session.
pub const MAX_VECTORS: usize = 1024;

/// Uploaded test program: the DUT class and the ordered vector sequence,
/// one byte per bank per step.
#[derive(Debug, Clone)]
pub struct TestSession {
    test_type: TestType,
    vectors: Vec<[u8; BANKS]>,
}

impl TestSession {
    fn new() -> Self {
        Self {
            test_type: TestType::Combinational,
            vectors: Vec::new(),
        }
    }

    /// Replaces the whole session. Callers must keep the sequence at or
    /// below [`MAX_VECTORS`]; the store itself performs no bounds check.
    pub fn upload(&mut self, test_type: TestType, vectors: Vec<[u8; BANKS]>) {
        self.test_type = test_type;
        self.vectors = vectors;
    }

    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    pub fn get(&self, pos: usize) -> [u8; BANKS] {
        self.vectors[pos]
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Access to the three 8-bit DUT pin banks.
///
/// A hardware implementation maps these calls straight onto the port
/// direction, output and input registers. The implementations in this crate
/// model the electrical behavior of a connected DUT instead, so tests and
/// the CLI can run the engine without a tester board attached.
pub trait Bus {
    /// Sets which pins of the bank are tester-driven outputs (bit = 1).
    fn set_direction(&mut self, bank: usize, mask: u8);
    /// Writes the bank's output register.
    fn write(&mut self, bank: usize, value: u8);
    /// Reads the bank's input register: the actual pin levels.
    fn read(&mut self, bank: usize) -> u8;
}

// Minimum-duration contracts for the timing-sensitive sequences. These are
// hard requirements of the driven chips, not hints: shortening any of them
// produces physically invalid transitions and silently corrupt verdicts.

/// Chip power stabilization before the first memory access, in microseconds.
pub const MIN_POWER_UP_SETTLE_US: u64 = 100;
/// Held low time of a row strobe warm-up pulse, in nanoseconds.
pub const MIN_ROW_STROBE_PULSE_NS: u64 = 120;
/// Column strobe assertion to data-out valid, in nanoseconds (two bus cycles
/// at the 16 MHz tester clock).
pub const MIN_DATA_VALID_DELAY_NS: u64 = 125;
/// Drive-to-sample propagation settle for logic vectors, in nanoseconds (one
/// instruction cycle at the 16 MHz tester clock).
pub const MIN_OUTPUT_SETTLE_NS: u64 = 63;

/// Timing capability: one method per named minimum-duration contract.
pub trait Delay {
    /// Waits at least [`MIN_POWER_UP_SETTLE_US`].
    fn power_up_settle(&mut self);
    /// Waits at least [`MIN_ROW_STROBE_PULSE_NS`].
    fn strobe_pulse(&mut self);
    /// Waits at least [`MIN_DATA_VALID_DELAY_NS`].
    fn data_valid(&mut self);
    /// Waits at least [`MIN_OUTPUT_SETTLE_NS`].
    fn output_settle(&mut self);
}

/// Busy-waits real time, for buses backed by actual hardware ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl SpinDelay {
    fn spin(duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

impl Delay for SpinDelay {
    fn power_up_settle(&mut self) {
        Self::spin(Duration::from_micros(MIN_POWER_UP_SETTLE_US));
    }

    fn strobe_pulse(&mut self) {
        Self::spin(Duration::from_nanos(MIN_ROW_STROBE_PULSE_NS));
    }

    fn data_valid(&mut self) {
        Self::spin(Duration::from_nanos(MIN_DATA_VALID_DELAY_NS));
    }

    fn output_settle(&mut self) {
        Self::spin(Duration::from_nanos(MIN_OUTPUT_SETTLE_NS));
    }
}

/// No-op timing for simulated buses, where settling is modeled structurally
/// rather than in wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn power_up_settle(&mut self) {}
    fn strobe_pulse(&mut self) {}
    fn data_valid(&mut self) {}
    fn output_settle(&mut self) {}
}

// Fixed pin mapping of the memory test bus. Two of the three banks act as a
// multiplexed address/control bus for a 65536 x 1 bit DRAM; the 16-bit cell
// address splits into an 8-bit row and an 8-bit column presented on the same
// lines under the row and column strobes respectively.
//
//        bit:   7    6    5    4    3    2    1    0
//   low bank:   -   NC   Din  ~WE  ~RAS  A0   A2   A1
//  high bank:  NC   A7   A5   A4   A3   A6  Dout ~CAS

/// Bank carrying the low 3 address bits, write-enable, row strobe and Din.
pub const MEM_LOW_BANK: usize = 0;
/// Bank carrying the high 5 address bits, column strobe and Dout.
pub const MEM_HIGH_BANK: usize = 2;

pub const WE_OFF: u8 = 1 << 4;
pub const WE_ON: u8 = 0;
pub const RAS_OFF: u8 = 1 << 3;
// The strobes are active-low, so the asserted level contributes no bits;
// the constants exist so the sequences below read as signal intent.
pub const RAS_ON: u8 = 0;
pub const CAS_OFF: u8 = 1 << 0;
pub const CAS_ON: u8 = 0;

/// Bit position of the Din line on the low bank.
pub const DIN_SHIFT: u8 = 5;
/// Bit position of the Dout line on the high bank.
pub const DOUT_SHIFT: u8 = 1;

/// Row strobe pulses required by the chip before its first access.
pub const MEM_WARM_UP_PULSES: u32 = 8;

fn addr_low(half: u8) -> u8 {
    half & 0b0000_0111
}

fn addr_high(half: u8) -> u8 {
    (half & 0b1111_1000) >> 1
}

fn data_bit(data: u8) -> u8 {
    (data & 1) << DIN_SHIFT
}

/// The tester engine: the three configured pin banks, the uploaded session,
/// and the bus and timing capabilities it executes against.
///
/// All state is owned here and mutated only between runs; a run is a closed
/// critical section over the bus.
pub struct Tester<B: Bus, D: Delay> {
    banks: [PinBank; BANKS],
    session: TestSession,
    bus: B,
    delay: D,
}

impl<B: Bus, D: Delay> Tester<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            banks: [PinBank::default(); BANKS],
            session: TestSession::new(),
            bus,
            delay,
        }
    }

    /// Stores a new bank configuration. No bus side effect until
    /// [`configure`](Self::configure) applies it.
    pub fn set_banks(&mut self, banks: [PinBank; BANKS]) {
        self.banks = banks;
    }

    /// Replaces the stored test session.
    pub fn upload(&mut self, test_type: TestType, vectors: Vec<[u8; BANKS]>) {
        self.session.upload(test_type, vectors);
    }

    pub fn banks(&self) -> &[PinBank; BANKS] {
        &self.banks
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Applies the stored configuration: each bank's direction register is
    /// set to `used & direction`. Pure configuration, no other side effect.
    pub fn configure(&mut self) {
        for bank in 0..BANKS {
            self.bus
                .set_direction(bank, self.banks[bank].direction & self.banks[bank].used);
        }
    }

    /// Returns all banks to the safe idle state: every pin an input, every
    /// output register cleared. Entered before and after any run.
    pub fn reset(&mut self) {
        for bank in 0..BANKS {
            self.bus.set_direction(bank, 0);
        }
        for bank in 0..BANKS {
            self.bus.write(bank, 0);
        }
    }

    /// Drives one vector byte onto a bank. Vector bits reach only driven
    /// pins; DUT-output pins get their idle pull level; pins outside `used`
    /// are never touched.
    pub fn drive(&mut self, bank: usize, vector_byte: u8) {
        let cfg = self.banks[bank];
        let data = vector_byte & cfg.direction;
        let pull = cfg.idle_pull & !cfg.direction;
        self.bus.write(bank, cfg.used & (data | pull));
    }

    /// Samples a bank, masked to the pins that are both connected and
    /// DUT-driven.
    pub fn sample(&mut self, bank: usize) -> u8 {
        let cfg = self.banks[bank];
        self.bus.read(bank) & !cfg.direction & cfg.used
    }

    /// Runs the uploaded vector sequence against a combinational or
    /// sequential DUT. The first mismatching bank aborts with `Fail`.
    pub fn run_logic(&mut self) -> Response {
        for pos in 0..self.session.len() {
            let vector = self.session.get(pos);
            for bank in 0..BANKS {
                self.drive(bank, vector[bank]);
            }
            self.delay.output_settle();

            let sample_now = match self.session.test_type {
                TestType::Combinational => true,
                TestType::Sequential => pos % 2 == 1,
                TestType::Memory => false,
            };
            if sample_now {
                for bank in 0..BANKS {
                    let cfg = self.banks[bank];
                    let expected = vector[bank] & !cfg.direction & cfg.used;
                    if self.sample(bank) != expected {
                        return Response::Fail;
                    }
                }
            }
        }
        Response::Pass
    }

    /// Brings the memory bus up: both ports driven with strobes idle-high,
    /// the power-up settle, then the warm-up row strobe pulses the chip
    /// requires before its first access.
    pub fn mem_setup(&mut self) {
        self.bus.set_direction(MEM_LOW_BANK, 0b1111_1111);
        self.bus.write(MEM_LOW_BANK, WE_OFF | RAS_OFF);
        // everything except Dout
        self.bus.set_direction(MEM_HIGH_BANK, 0b1111_1101);
        self.bus.write(MEM_HIGH_BANK, CAS_OFF);

        self.delay.power_up_settle();
        for _ in 0..MEM_WARM_UP_PULSES {
            self.bus.write(MEM_LOW_BANK, WE_OFF | RAS_ON);
            self.delay.strobe_pulse();
            self.bus.write(MEM_LOW_BANK, WE_OFF | RAS_OFF);
        }
    }

    /// Writes one bit to one cell and immediately reads it back. Single-cell
    /// diagnostic primitive; the full memory run uses the page cycle below.
    ///
    /// [`mem_setup`](Self::mem_setup) must have run first.
    pub fn mem_test_bit(&mut self, addr: u16, data: u8) -> Response {
        let addr_col = addr as u8;
        let addr_row = (addr >> 8) as u8;

        // write cycle (early write: ~WE falls before ~CAS)

        // present row address
        let mut low = addr_low(addr_row) | WE_OFF | RAS_OFF;
        let mut high = addr_high(addr_row) | CAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        self.bus.write(MEM_HIGH_BANK, high);
        // row strobe low
        low &= !RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        // write enable low
        low &= !WE_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        // data line; row address bits dropped, strobe stays asserted
        low = data_bit(data);
        self.bus.write(MEM_LOW_BANK, low);
        // column address
        low |= addr_low(addr_col);
        self.bus.write(MEM_LOW_BANK, low);
        high = addr_high(addr_col) | CAS_OFF;
        self.bus.write(MEM_HIGH_BANK, high);
        // column strobe low
        high &= !CAS_OFF;
        self.bus.write(MEM_HIGH_BANK, high);
        // write enable high
        low |= WE_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        // column strobe high
        high |= CAS_OFF;
        self.bus.write(MEM_HIGH_BANK, high);
        // row strobe high
        low |= RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        // data line back to 0
        low &= !(1 << DIN_SHIFT);
        self.bus.write(MEM_LOW_BANK, low);

        // read cycle

        // present row address
        low = addr_low(addr_row) | WE_OFF | RAS_OFF;
        high = addr_high(addr_row) | CAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        self.bus.write(MEM_HIGH_BANK, high);
        // row strobe low
        low &= !RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        // column address, write enable kept high; the whole-register write
        // keeps the row strobe asserted
        low = addr_low(addr_col) | WE_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        high = addr_high(addr_col) | CAS_OFF;
        self.bus.write(MEM_HIGH_BANK, high);
        // column strobe low
        high &= !CAS_OFF;
        self.bus.write(MEM_HIGH_BANK, high);
        // wait for valid data
        self.delay.data_valid();
        let dout = (self.bus.read(MEM_HIGH_BANK) >> DOUT_SHIFT) & 1;
        // column strobe high
        high |= CAS_OFF;
        self.bus.write(MEM_HIGH_BANK, high);
        // row strobe high
        low |= RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);

        if dout == data & 1 {
            Response::Pass
        } else {
            Response::Fail
        }
    }

    /// Tests one full 256-column row: the row strobe is latched once while
    /// every column is written, released, then latched again while every
    /// column is read back. Writes never interleave with reads within the
    /// row. Aborts the page on the first mismatching cell.
    pub fn mem_test_page(&mut self, addr_row: u8, data: u8) -> Response {
        let mut res = Response::Pass;

        // write the whole row

        // present row address
        let mut low = addr_low(addr_row) | WE_OFF | RAS_OFF;
        let mut high = addr_high(addr_row) | CAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        self.bus.write(MEM_HIGH_BANK, high);
        // row strobe low, held for all 256 columns
        low &= !RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        for addr_col in 0..=255u8 {
            // write enable low
            low &= !WE_OFF;
            self.bus.write(MEM_LOW_BANK, low);
            // data line; previous column bits dropped
            low = data_bit(data);
            self.bus.write(MEM_LOW_BANK, low);
            // column address
            low |= addr_low(addr_col);
            self.bus.write(MEM_LOW_BANK, low);
            high = addr_high(addr_col) | CAS_OFF;
            self.bus.write(MEM_HIGH_BANK, high);
            // column strobe pulse
            high &= !CAS_OFF;
            self.bus.write(MEM_HIGH_BANK, high);
            // write enable high
            low |= WE_OFF;
            self.bus.write(MEM_LOW_BANK, low);
            // column strobe high
            high |= CAS_OFF;
            self.bus.write(MEM_HIGH_BANK, high);
        }
        // row strobe high
        low |= RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        // data line back to 0
        low &= !(1 << DIN_SHIFT);
        self.bus.write(MEM_LOW_BANK, low);

        // read the whole row back

        // present row address
        low = addr_low(addr_row) | WE_OFF | RAS_OFF;
        high = addr_high(addr_row) | CAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        self.bus.write(MEM_HIGH_BANK, high);
        // row strobe low
        low &= !RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);
        for addr_col in 0..=255u8 {
            // column address, write enable kept high
            low = addr_low(addr_col) | WE_OFF;
            self.bus.write(MEM_LOW_BANK, low);
            high = addr_high(addr_col) | CAS_OFF;
            self.bus.write(MEM_HIGH_BANK, high);
            // column strobe low
            high &= !CAS_OFF;
            self.bus.write(MEM_HIGH_BANK, high);
            // wait for valid data
            self.delay.data_valid();
            let dout = (self.bus.read(MEM_HIGH_BANK) >> DOUT_SHIFT) & 1;
            // column strobe high
            high |= CAS_OFF;
            self.bus.write(MEM_HIGH_BANK, high);
            if dout != data & 1 {
                res = Response::Fail;
                break;
            }
        }
        // row strobe high, also on the abort path
        low |= RAS_OFF;
        self.bus.write(MEM_LOW_BANK, low);

        res
    }

    /// Exercises the complete 65536-cell address space: every row is tested
    /// in full with pattern 0, then again with pattern 1, aborting the whole
    /// run at the first failing page.
    pub fn run_memory(&mut self) -> Response {
        self.mem_setup();

        for addr_row in 0..=255u8 {
            if self.mem_test_page(addr_row, 0) != Response::Pass {
                return Response::Fail;
            }
            if self.mem_test_page(addr_row, 1) != Response::Pass {
                return Response::Fail;
            }
        }
        Response::Pass
    }

    /// Executes the stored session `2^exponent` times, stopping at the first
    /// `Fail`. Callers must keep `exponent` below 32.
    pub fn run(&mut self, exponent: u8) -> Response {
        let repetitions = 1u32 << exponent;
        for _ in 0..repetitions {
            let res = match self.session.test_type {
                TestType::Memory => self.run_memory(),
                _ => self.run_logic(),
            };
            if res != Response::Pass {
                return Response::Fail;
            }
        }
        Response::Pass
    }

    /// Reads one command from the channel, executes it, and writes the
    /// single-byte reply. Returns the reply that was sent.
    pub fn dispatch<C: Read + Write>(
        &mut self,
        channel: &mut C,
    ) -> Result<Response, ProtocolError> {
        let mut cmd = [0u8; 1];
        channel.read_exact(&mut cmd)?;
        match cmd[0] >> 5 {
            CMD_SETUP => self.cmd_setup(channel),
            CMD_UPLOAD => self.cmd_upload(channel),
            CMD_RUN => self.cmd_run(channel),
            _ => reply(channel, Response::Err),
        }
    }

    /// Serves commands until the channel closes. An idle read timeout is not
    /// an error; it only means no command has arrived yet.
    pub fn serve<C: Read + Write>(&mut self, channel: &mut C) -> Result<(), ProtocolError> {
        loop {
            match self.dispatch(channel) {
                Ok(_) => (),
                Err(ProtocolError::ChannelClosed) => return Ok(()),
                Err(ProtocolError::Io(err)) if err.kind() == io::ErrorKind::TimedOut => (),
                Err(err) => return Err(err),
            }
        }
    }

    fn cmd_setup<C: Read + Write>(&mut self, channel: &mut C) -> Result<Response, ProtocolError> {
        let mut raw = [0u8; 3 * BANKS];
        channel.read_exact(&mut raw)?;

        let mut banks = [PinBank::default(); BANKS];
        for (bank, chunk) in banks.iter_mut().zip(raw.chunks_exact(3)) {
            bank.used = chunk[0];
            bank.direction = chunk[1];
            bank.idle_pull = chunk[2];
        }
        self.set_banks(banks);
        reply(channel, Response::Ok)
    }

    fn cmd_upload<C: Read + Write>(&mut self, channel: &mut C) -> Result<Response, ProtocolError> {
        let mut head = [0u8; 3];
        channel.read_exact(&mut head)?;
        let length = u16::from_be_bytes([head[1], head[2]]) as usize;

        // the whole advertised payload is consumed before validation, so a
        // rejected upload leaves the channel in sync
        let mut raw = vec![0u8; length * 3];
        channel.read_exact(&mut raw)?;

        let test_type = match TestType::from_wire(head[0]) {
            Some(test_type) if length <= MAX_VECTORS => test_type,
            _ => return reply(channel, Response::Err),
        };
        let vectors = raw
            .chunks_exact(3)
            .map(|chunk| [chunk[0], chunk[1], chunk[2]])
            .collect();
        self.session.upload(test_type, vectors);
        reply(channel, Response::Ok)
    }

    fn cmd_run<C: Read + Write>(&mut self, channel: &mut C) -> Result<Response, ProtocolError> {
        let mut raw = [0u8; 1];
        channel.read_exact(&mut raw)?;

        self.configure();
        let verdict = self.run(raw[0]);
        self.reset();
        reply(channel, verdict)
    }
}

fn reply<C: Write>(channel: &mut C, response: Response) -> Result<Response, ProtocolError> {
    channel.write_all(&[response as u8])?;
    channel.flush()?;
    Ok(response)
}

/// In-memory byte channel: reads consume a preloaded request buffer, writes
/// append to the reply buffer. Lets the dispatch loop run the same way it
/// runs over a serial port.
pub struct ByteChannel {
    input: io::Cursor<Vec<u8>>,
    pub output: Vec<u8>,
}

impl ByteChannel {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: io::Cursor::new(input),
            output: Vec::new(),
        }
    }
}

impl Read for ByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ByteChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Simulated loopback wiring: each pin of the `mirror` bank is driven by the
/// corresponding pin of the `source` bank, either straight through or
/// through an inverter. Undriven, unwired pins read low.
pub struct MirrorBus {
    direction: [u8; BANKS],
    output: [u8; BANKS],
    source: usize,
    mirror: usize,
    invert: bool,
}

impl MirrorBus {
    /// Straight-through wiring, as if the DUT were a non-inverting buffer.
    pub fn new(source: usize, mirror: usize) -> Self {
        Self {
            direction: [0; BANKS],
            output: [0; BANKS],
            source,
            mirror,
            invert: false,
        }
    }

    /// Inverting wiring, as if the DUT were a bank-wide inverter.
    pub fn inverting(source: usize, mirror: usize) -> Self {
        Self {
            invert: true,
            ..Self::new(source, mirror)
        }
    }
}

impl Bus for MirrorBus {
    fn set_direction(&mut self, bank: usize, mask: u8) {
        self.direction[bank] = mask;
    }

    fn write(&mut self, bank: usize, value: u8) {
        self.output[bank] = value;
    }

    fn read(&mut self, bank: usize) -> u8 {
        let driven = self.output[bank] & self.direction[bank];
        if bank != self.mirror {
            return driven;
        }
        let mut echoed = self.output[self.source] & self.direction[self.source];
        if self.invert {
            echoed = !echoed;
        }
        driven | (echoed & !self.direction[bank])
    }
}

/// One decoded cell access, as seen by the simulated memory chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAccess {
    Write { row: u8, col: u8, bit: u8 },
    Read { row: u8, col: u8, bit: u8 },
}

/// Simulated 65536 x 1 bit DRAM behind the multiplexed memory bus.
///
/// The model is deliberately strict: a sequence that would be physically
/// invalid on the real part panics instead of returning garbage, so an
/// engine regression fails tests loudly rather than producing a silent
/// false verdict.
pub struct DramBus {
    direction: [u8; BANKS],
    output: [u8; BANKS],
    cells: Vec<u8>,
    latched_row: Option<u8>,
    ras_pulses: u32,
    dout: u8,
    stuck: Option<u16>,
    trace: Option<Vec<CellAccess>>,
}

impl DramBus {
    pub fn new() -> Self {
        Self {
            direction: [0; BANKS],
            output: [0; BANKS],
            cells: vec![0; 1 << 16],
            latched_row: None,
            ras_pulses: 0,
            dout: 0,
            stuck: None,
            trace: None,
        }
    }

    /// Same chip, but every decoded cell access is recorded.
    pub fn with_trace() -> Self {
        Self {
            trace: Some(Vec::new()),
            ..Self::new()
        }
    }

    pub fn trace(&self) -> &[CellAccess] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Pins one cell at a fixed value, simulating a stuck-at defect.
    pub fn stick_cell(&mut self, addr: u16, bit: u8) {
        self.stuck = Some(addr);
        self.cells[addr as usize] = bit & 1;
    }

    // Address currently presented on the multiplexed lines of both ports.
    fn presented_address(&self) -> u8 {
        (self.output[MEM_LOW_BANK] & 0b0000_0111)
            | ((self.output[MEM_HIGH_BANK] & 0b0111_1100) << 1)
    }

    fn column_strobe(&mut self) {
        assert!(
            self.ras_pulses >= MEM_WARM_UP_PULSES,
            "column strobe before the {} warm-up row strobe pulses completed",
            MEM_WARM_UP_PULSES
        );
        let row = self
            .latched_row
            .expect("column strobe asserted with no row latched");
        let col = self.presented_address();
        let cell = (row as usize) << 8 | col as usize;

        if self.output[MEM_LOW_BANK] & WE_OFF == 0 {
            // early-write cycle: Din is latched on the falling strobe edge
            let bit = (self.output[MEM_LOW_BANK] >> DIN_SHIFT) & 1;
            if self.stuck != Some(cell as u16) {
                self.cells[cell] = bit;
            }
            if let Some(trace) = &mut self.trace {
                trace.push(CellAccess::Write { row, col, bit });
            }
        } else {
            let bit = self.cells[cell];
            self.dout = bit;
            if let Some(trace) = &mut self.trace {
                trace.push(CellAccess::Read { row, col, bit });
            }
        }
    }
}

impl Default for DramBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for DramBus {
    fn set_direction(&mut self, bank: usize, mask: u8) {
        if bank == MEM_HIGH_BANK {
            assert!(
                mask & (1 << DOUT_SHIFT) == 0,
                "data-out line driven from both sides"
            );
        }
        self.direction[bank] = mask;
    }

    fn write(&mut self, bank: usize, value: u8) {
        let previous = self.output[bank];
        self.output[bank] = value;
        match bank {
            MEM_LOW_BANK => {
                if previous & RAS_OFF != 0 && value & RAS_OFF == 0 {
                    // falling row strobe latches the presented row address
                    self.latched_row = Some(self.presented_address());
                    self.ras_pulses += 1;
                } else if previous & RAS_OFF == 0 && value & RAS_OFF != 0 {
                    self.latched_row = None;
                }
            }
            MEM_HIGH_BANK => {
                if previous & CAS_OFF != 0 && value & CAS_OFF == 0 {
                    self.column_strobe();
                }
            }
            _ => (),
        }
    }

    fn read(&mut self, bank: usize) -> u8 {
        let driven = self.output[bank] & self.direction[bank];
        if bank == MEM_HIGH_BANK {
            driven | ((self.dout << DOUT_SHIFT) & !self.direction[bank])
        } else {
            driven
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bus that answers reads from fixed per-bank values and records every
    // operation, optionally corrupting reads after the nth one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum BusOp {
        Direction(usize, u8),
        Write(usize, u8),
        Read(usize),
    }

    struct RecordingBus {
        ops: Vec<BusOp>,
        read_value: [u8; BANKS],
        corrupt_after_read: Option<usize>,
        reads_seen: usize,
    }

    impl RecordingBus {
        fn new(read_value: [u8; BANKS]) -> Self {
            Self {
                ops: Vec::new(),
                read_value,
                corrupt_after_read: None,
                reads_seen: 0,
            }
        }

        fn reads(&self) -> usize {
            self.ops
                .iter()
                .filter(|op| matches!(op, BusOp::Read(_)))
                .count()
        }
    }

    impl Bus for RecordingBus {
        fn set_direction(&mut self, bank: usize, mask: u8) {
            self.ops.push(BusOp::Direction(bank, mask));
        }

        fn write(&mut self, bank: usize, value: u8) {
            self.ops.push(BusOp::Write(bank, value));
        }

        fn read(&mut self, bank: usize) -> u8 {
            self.ops.push(BusOp::Read(bank));
            self.reads_seen += 1;
            match self.corrupt_after_read {
                Some(n) if self.reads_seen > n => !self.read_value[bank],
                _ => self.read_value[bank],
            }
        }
    }

    fn loopback_tester(invert: bool) -> Tester<MirrorBus, NoDelay> {
        let bus = if invert {
            MirrorBus::inverting(0, 1)
        } else {
            MirrorBus::new(0, 1)
        };
        let mut tester = Tester::new(bus, NoDelay);
        tester.set_banks([
            PinBank { used: 0xFF, direction: 0xFF, idle_pull: 0x00 },
            PinBank { used: 0xFF, direction: 0x00, idle_pull: 0x00 },
            PinBank::default(),
        ]);
        tester.configure();
        tester
    }

    fn dram_tester(bus: DramBus) -> Tester<DramBus, NoDelay> {
        Tester::new(bus, NoDelay)
    }

    // --- Pin bank configuration and drive/sample masking ---

    #[test]
    fn configure_writes_only_used_direction_pins() {
        let mut tester = Tester::new(RecordingBus::new([0; BANKS]), NoDelay);
        tester.set_banks([
            PinBank { used: 0x0F, direction: 0x33, idle_pull: 0xF0 },
            PinBank { used: 0xFF, direction: 0x00, idle_pull: 0xAA },
            PinBank { used: 0x00, direction: 0xFF, idle_pull: 0xFF },
        ]);
        tester.configure();

        assert_eq!(
            tester.bus().ops,
            vec![
                BusOp::Direction(0, 0x03),
                BusOp::Direction(1, 0x00),
                BusOp::Direction(2, 0x00),
            ]
        );
    }

    #[test]
    fn drive_masks_vector_and_pull_to_used_pins() {
        let mut tester = Tester::new(RecordingBus::new([0; BANKS]), NoDelay);
        tester.set_banks([
            PinBank { used: 0x0F, direction: 0x33, idle_pull: 0xF0 },
            PinBank { used: 0xFF, direction: 0x00, idle_pull: 0xAA },
            PinBank { used: 0x00, direction: 0xFF, idle_pull: 0xFF },
        ]);
        for bank in 0..BANKS {
            tester.drive(bank, 0xFF);
        }

        // bank 0: data = FF & 33, pull = F0 & ~33, write = 0F & (33 | C0)
        // bank 1: nothing driven, pull everywhere
        // bank 2: nothing connected
        assert_eq!(
            tester.bus().ops,
            vec![
                BusOp::Write(0, 0x03),
                BusOp::Write(1, 0xAA),
                BusOp::Write(2, 0x00),
            ]
        );
        for op in &tester.bus().ops {
            if let BusOp::Write(bank, value) = op {
                let used = tester.banks()[*bank].used;
                assert_eq!(value & !used, 0, "write leaked outside used pins");
            }
        }
    }

    #[test]
    fn sample_masks_to_connected_dut_outputs() {
        let mut tester = Tester::new(RecordingBus::new([0xFF; BANKS]), NoDelay);
        tester.set_banks([
            PinBank { used: 0x3C, direction: 0x0C, idle_pull: 0x00 },
            PinBank::default(),
            PinBank::default(),
        ]);

        assert_eq!(tester.sample(0), 0x30);
    }

    #[test]
    fn reset_floats_all_banks_then_clears_outputs() {
        let mut tester = Tester::new(RecordingBus::new([0; BANKS]), NoDelay);
        tester.reset();

        assert_eq!(
            tester.bus().ops,
            vec![
                BusOp::Direction(0, 0),
                BusOp::Direction(1, 0),
                BusOp::Direction(2, 0),
                BusOp::Write(0, 0),
                BusOp::Write(1, 0),
                BusOp::Write(2, 0),
            ]
        );
    }

    // --- Generic logic engine ---

    #[test]
    fn combinational_loopback_passes() {
        let mut tester = loopback_tester(false);
        tester.upload(
            TestType::Combinational,
            vec![
                [0x00, 0x00, 0x00],
                [0xFF, 0xFF, 0x00],
                [0xA5, 0xA5, 0x00],
                [0x5A, 0x5A, 0x00],
            ],
        );

        assert_eq!(tester.run_logic(), Response::Pass);
    }

    #[test]
    fn combinational_mismatch_fails() {
        let mut tester = loopback_tester(false);
        tester.upload(
            TestType::Combinational,
            vec![[0x0F, 0x0F, 0x00], [0xF0, 0x0F, 0x00]],
        );

        assert_eq!(tester.run_logic(), Response::Fail);
    }

    #[test]
    fn sequential_ignores_even_position_mismatches() {
        let mut tester = loopback_tester(false);
        // even positions deliberately expect the wrong echo; they set up
        // state and must not be sampled
        tester.upload(
            TestType::Sequential,
            vec![
                [0xFF, 0x00, 0x00],
                [0xAA, 0xAA, 0x00],
                [0x55, 0xFF, 0x00],
                [0x0F, 0x0F, 0x00],
            ],
        );

        assert_eq!(tester.run_logic(), Response::Pass);
    }

    #[test]
    fn sequential_checks_odd_positions() {
        let mut tester = loopback_tester(false);
        tester.upload(
            TestType::Sequential,
            vec![[0xAA, 0xAA, 0x00], [0x55, 0xFF, 0x00]],
        );

        assert_eq!(tester.run_logic(), Response::Fail);
    }

    #[test]
    fn empty_session_passes() {
        let mut tester = loopback_tester(false);
        assert_eq!(tester.run_logic(), Response::Pass);
    }

    // --- Repetition control ---

    #[test]
    fn exponent_zero_runs_exactly_once() {
        let bus = RecordingBus::new([0xAA, 0x00, 0x00]);
        let mut tester = Tester::new(bus, NoDelay);
        tester.set_banks([
            PinBank { used: 0xFF, direction: 0x00, idle_pull: 0x00 },
            PinBank::default(),
            PinBank::default(),
        ]);
        tester.upload(TestType::Combinational, vec![[0xAA, 0x00, 0x00]]);

        assert_eq!(tester.run(0), Response::Pass);
        // one iteration samples each bank exactly once
        assert_eq!(tester.bus().reads(), BANKS);
    }

    #[test]
    fn repetitions_stop_at_first_fail() {
        let mut bus = RecordingBus::new([0xAA, 0x00, 0x00]);
        // iterations 1 and 2 read clean; the first read of iteration 3 is
        // corrupted, so no further iteration may run
        bus.corrupt_after_read = Some(2 * BANKS);
        let mut tester = Tester::new(bus, NoDelay);
        tester.set_banks([
            PinBank { used: 0xFF, direction: 0x00, idle_pull: 0x00 },
            PinBank::default(),
            PinBank::default(),
        ]);
        tester.upload(TestType::Combinational, vec![[0xAA, 0x00, 0x00]]);

        assert_eq!(tester.run(3), Response::Fail);
        assert_eq!(tester.bus().reads(), 2 * BANKS + 1);
    }

    // --- Vector store ---

    #[test]
    fn upload_replaces_session_wholesale() {
        let mut session = TestSession::new();
        session.upload(TestType::Sequential, vec![[1, 2, 3], [4, 5, 6], [7, 8, 9]]);
        session.upload(TestType::Combinational, vec![[0xAB, 0xCD, 0xEF]]);

        assert_eq!(session.test_type(), TestType::Combinational);
        assert_eq!(session.len(), 1);
        assert_eq!(session.get(0), [0xAB, 0xCD, 0xEF]);
    }

    // --- DRAM engine ---

    #[test]
    fn single_cell_round_trip() {
        let mut tester = dram_tester(DramBus::new());
        tester.mem_setup();

        for addr in [0x0000, 0x00FF, 0xFF00, 0xFFFF, 0x1234] {
            for data in [0, 1] {
                assert_eq!(
                    tester.mem_test_bit(addr, data),
                    Response::Pass,
                    "addr {:#06x} data {}",
                    addr,
                    data
                );
            }
        }
    }

    #[test]
    fn single_cell_detects_stuck_cell() {
        let mut bus = DramBus::new();
        bus.stick_cell(0x1234, 0);
        let mut tester = dram_tester(bus);
        tester.mem_setup();

        assert_eq!(tester.mem_test_bit(0x1234, 1), Response::Fail);
        assert_eq!(tester.mem_test_bit(0x1234, 0), Response::Pass);
    }

    #[test]
    fn page_round_trip() {
        let mut tester = dram_tester(DramBus::new());
        tester.mem_setup();

        assert_eq!(tester.mem_test_page(0x42, 0), Response::Pass);
        assert_eq!(tester.mem_test_page(0x42, 1), Response::Pass);
    }

    #[test]
    fn page_abort_releases_row_strobe() {
        let mut bus = DramBus::new();
        bus.stick_cell(0x4280, 0);
        let mut tester = dram_tester(bus);
        tester.mem_setup();

        assert_eq!(tester.mem_test_page(0x42, 1), Response::Fail);
        assert_ne!(tester.bus().output[MEM_LOW_BANK] & RAS_OFF, 0);
    }

    #[test]
    fn full_memory_run_passes() {
        let mut tester = dram_tester(DramBus::new());
        assert_eq!(tester.run_memory(), Response::Pass);
    }

    #[test]
    fn full_memory_run_detects_stuck_cell() {
        let mut bus = DramBus::new();
        bus.stick_cell(0xBEEF, 0);
        let mut tester = dram_tester(bus);

        assert_eq!(tester.run_memory(), Response::Fail);
    }

    #[test]
    fn memory_rows_see_pattern_zero_fully_before_pattern_one() {
        let mut tester = dram_tester(DramBus::with_trace());
        assert_eq!(tester.run_memory(), Response::Pass);

        let trace = tester.bus().trace();
        assert_eq!(trace.len(), 256 * 1024);
        for (row, accesses) in trace.chunks(1024).enumerate() {
            let row = row as u8;
            for (i, access) in accesses.iter().enumerate() {
                let col = (i % 256) as u8;
                let expected = match i / 256 {
                    0 => CellAccess::Write { row, col, bit: 0 },
                    1 => CellAccess::Read { row, col, bit: 0 },
                    2 => CellAccess::Write { row, col, bit: 1 },
                    _ => CellAccess::Read { row, col, bit: 1 },
                };
                assert_eq!(*access, expected, "row {} access {}", row, i);
            }
        }
    }

    #[test]
    #[should_panic(expected = "warm-up")]
    fn column_access_requires_warm_up_pulses() {
        let mut tester = dram_tester(DramBus::new());
        // no mem_setup: the chip has seen no warm-up pulses yet
        tester.mem_test_bit(0x0000, 1);
    }

    #[test]
    #[should_panic(expected = "no row latched")]
    fn column_strobe_requires_latched_row() {
        let mut tester = dram_tester(DramBus::new());
        tester.mem_setup();

        // column strobe with the row strobe idle-high
        let bus = tester.bus_mut();
        bus.write(MEM_HIGH_BANK, CAS_OFF);
        bus.write(MEM_HIGH_BANK, CAS_ON);
    }

    #[test]
    #[should_panic(expected = "driven from both sides")]
    fn data_out_line_cannot_be_driven_by_tester() {
        let mut tester = dram_tester(DramBus::new());
        tester.set_banks([
            PinBank::default(),
            PinBank::default(),
            PinBank { used: 0xFF, direction: 1 << DOUT_SHIFT, idle_pull: 0x00 },
        ]);
        tester.configure();
    }

    // --- Protocol dispatch ---

    #[test]
    fn setup_command_stores_bank_configuration() {
        let mut input = vec![CMD_SETUP << 5];
        input.extend([0xFF, 0xFF, 0x00, 0xFF, 0x00, 0x0F, 0x00, 0x00, 0x00]);
        let mut channel = ByteChannel::new(input);
        let mut tester = Tester::new(MirrorBus::new(0, 1), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(channel.output, vec![Response::Ok as u8]);
        assert_eq!(
            tester.banks()[1],
            PinBank { used: 0xFF, direction: 0x00, idle_pull: 0x0F }
        );
    }

    #[test]
    fn example_inverter_part_passes_end_to_end() {
        // bank 1 observes the inverse of bank 0, and the two vectors expect
        // exactly that
        let mut input = vec![CMD_SETUP << 5];
        input.extend([0xFF, 0xFF, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00]);
        input.push(CMD_UPLOAD << 5);
        input.extend([0x00, 0x00, 0x02]);
        input.extend([0xFF, 0x00, 0x00]);
        input.extend([0x00, 0xFF, 0x00]);
        input.push(CMD_RUN << 5);
        input.push(0x00);

        let mut channel = ByteChannel::new(input);
        let mut tester = Tester::new(MirrorBus::inverting(0, 1), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(
            channel.output,
            vec![Response::Ok as u8, Response::Ok as u8, Response::Pass as u8]
        );
    }

    #[test]
    fn run_leaves_banks_in_safe_idle_state() {
        let mut input = vec![CMD_SETUP << 5];
        input.extend([0xFF, 0xFF, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00]);
        input.push(CMD_UPLOAD << 5);
        input.extend([0x00, 0x00, 0x01]);
        input.extend([0xFF, 0x00, 0x00]);
        input.push(CMD_RUN << 5);
        input.push(0x00);

        let mut channel = ByteChannel::new(input);
        // straight loopback echoes 0xFF where 0x00 is expected
        let mut tester = Tester::new(MirrorBus::new(0, 1), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(channel.output[2], Response::Fail as u8);
        assert_eq!(tester.bus().direction, [0; BANKS]);
        assert_eq!(tester.bus().output, [0; BANKS]);
    }

    #[test]
    fn memory_session_over_protocol() {
        let mut input = vec![CMD_SETUP << 5];
        input.extend([0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF, 0b1111_1101, 0x00]);
        input.push(CMD_UPLOAD << 5);
        input.extend([0x02, 0x00, 0x00]);
        input.push(CMD_RUN << 5);
        input.push(0x00);

        let mut channel = ByteChannel::new(input);
        let mut tester = Tester::new(DramBus::new(), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(
            channel.output,
            vec![Response::Ok as u8, Response::Ok as u8, Response::Pass as u8]
        );
        assert_eq!(tester.bus().direction, [0; BANKS]);
        assert_eq!(tester.bus().output, [0; BANKS]);
    }

    #[test]
    fn memory_session_reports_defective_part() {
        let mut input = vec![CMD_UPLOAD << 5];
        input.extend([0x02, 0x00, 0x00]);
        input.push(CMD_RUN << 5);
        input.push(0x00);

        let mut bus = DramBus::new();
        bus.stick_cell(0x0101, 1);
        let mut channel = ByteChannel::new(input);
        let mut tester = Tester::new(bus, NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(
            channel.output,
            vec![Response::Ok as u8, Response::Fail as u8]
        );
    }

    #[test]
    fn unknown_opcode_replies_err() {
        let mut channel = ByteChannel::new(vec![0b1110_0111]);
        let mut tester = Tester::new(MirrorBus::new(0, 1), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(channel.output, vec![Response::Err as u8]);
    }

    #[test]
    fn opcode_low_bits_are_ignored() {
        let mut input = vec![(CMD_SETUP << 5) | 0x15];
        input.extend([0; 9]);
        let mut channel = ByteChannel::new(input);
        let mut tester = Tester::new(MirrorBus::new(0, 1), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(channel.output, vec![Response::Ok as u8]);
    }

    #[test]
    fn upload_rejects_unknown_type_and_keeps_session() {
        let mut input = vec![CMD_UPLOAD << 5];
        input.extend([0x00, 0x00, 0x01]);
        input.extend([0x11, 0x22, 0x33]);
        input.push(CMD_UPLOAD << 5);
        input.extend([0x09, 0x00, 0x01]);
        input.extend([0x44, 0x55, 0x66]);

        let mut channel = ByteChannel::new(input);
        let mut tester = Tester::new(MirrorBus::new(0, 1), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(channel.output, vec![Response::Ok as u8, Response::Err as u8]);
        assert_eq!(tester.session().test_type(), TestType::Combinational);
        assert_eq!(tester.session().len(), 1);
        assert_eq!(tester.session().get(0), [0x11, 0x22, 0x33]);
    }

    #[test]
    fn oversized_upload_rejected_without_desync() {
        // one vector over the limit; the payload must still be consumed so
        // the following command parses
        let length = (MAX_VECTORS + 1) as u16;
        let mut input = vec![CMD_UPLOAD << 5];
        input.extend(length.to_be_bytes());
        input.extend(vec![0u8; (MAX_VECTORS + 1) * 3]);
        input.push(CMD_SETUP << 5);
        input.extend([0; 9]);

        let mut channel = ByteChannel::new(input);
        let mut tester = Tester::new(MirrorBus::new(0, 1), NoDelay);
        tester.serve(&mut channel).unwrap();

        assert_eq!(channel.output, vec![Response::Err as u8, Response::Ok as u8]);
        assert!(tester.session().is_empty());
    }

    // --- Timing contracts and wire encodings ---

    #[test]
    fn spin_delay_honors_power_up_minimum() {
        let mut delay = SpinDelay;
        let started = Instant::now();
        delay.power_up_settle();
        assert!(started.elapsed() >= Duration::from_micros(MIN_POWER_UP_SETTLE_US));
    }

    #[test]
    fn wire_encodings_round_trip() {
        for response in [Response::Ok, Response::Err, Response::Pass, Response::Fail] {
            assert_eq!(Response::from_wire(response as u8), Some(response));
        }
        assert_eq!(Response::from_wire(9), None);
        assert_eq!(TestType::from_wire(2), Some(TestType::Memory));
        assert_eq!(TestType::from_wire(3), None);
    }
}
