#![allow(non_snake_case)]

use core::marker::PhantomData;

use thiserror::Error;

use crate::register::*;

pub type RegisterAddress = u8;
pub type RegisterValue = u8;

/// Size of one receive or transmit FIFO block.
pub const FIFO_BURST_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum Error {
    #[error("bus access to register {address:#04x} failed")]
    Register { address: RegisterAddress },
    #[error("FIFO burst of {length} bytes failed")]
    Fifo { length: usize },
}

pub type Result<T> = core::result::Result<T, Error>;

/// Register and FIFO access to one ISAC.
///
/// Implemented by whatever knows how the chip is wired to the host: a card
/// with an indirect address latch, memory-mapped I/O, a USB bridge, or a
/// test double. Every call is a single, non-blocking bus operation.
pub trait Bus {
    fn register_read(&self, address: RegisterAddress) -> Result<RegisterValue>;
    fn register_write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()>;
    fn fifo_read(&self, address: RegisterAddress, data: &mut [u8]) -> Result<()>;
    fn fifo_write(&self, address: RegisterAddress, data: &[u8]) -> Result<()>;
}

pub struct Access<'a, B, T>
where B: Bus,
{
    bus: &'a B,
    address: usize,
    t: PhantomData<T>,
}

impl<'a, B, T> Access<'a, B, T>
where B: Bus,
{
    fn new(bus: &'a B, address: usize) -> Self {
        Self {
            bus,
            address,
            t: PhantomData,
        }
    }

    pub fn address(&self) -> RegisterAddress {
        self.address as RegisterAddress
    }
}

impl<B, T> Access<'_, B, T>
where B: Bus,
      T: From<u8>,
{
    fn get_typed(&self, address: usize) -> Result<T> {
        assert!(address < REGISTERS_END);
        Ok(T::from(self.bus.register_read(address as RegisterAddress)?))
    }

    pub fn read(&self) -> Result<T> {
        self.get_typed(self.address)
    }
}

impl<B, T> Access<'_, B, T>
where B: Bus,
      T: From<u8> + Into<u8>,
{
    fn set_typed(&self, address: usize, value: T) -> Result<()> {
        assert!(address < REGISTERS_END);
        self.bus.register_write(address as RegisterAddress, value.into())
    }

    pub fn write<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let value = T::from(0);
        let new_value = f(value);
        self.set_typed(self.address, new_value)
    }

    /// Write a complete value, for registers with no meaningful zero state
    /// or write-only registers backed by a shadow copy.
    pub fn set(&self, value: T) -> Result<()> {
        self.set_typed(self.address, value)
    }

    /// Read, change, write back. Only valid for registers that read back
    /// what was written. Several ISAC addresses do not (ISTA/MASK,
    /// STAR/CMDR, CIR0/CIX0, MOSR/MOCR).
    pub fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let value = self.read()?;
        let new_value = f(value);
        self.set_typed(self.address, new_value)
    }
}

///////////////////////////////////////////////////////////////////////
// FIFO

pub struct Fifo<'a, B>
where B: Bus,
{
    bus: &'a B,
}

impl<'a, B> Fifo<'a, B>
where B: Bus,
{
    fn new(bus: &'a B) -> Self {
        Self {
            bus,
        }
    }

    /// Read one receive block. The caller must still release the block with
    /// CMDR.RMC.
    pub fn read(&self, data: &mut [u8]) -> Result<()> {
        assert!(data.len() <= FIFO_BURST_SIZE);
        self.bus.fifo_read(Addressing::fifo(), data)
    }

    /// Write one transmit block. The caller must still start it with
    /// CMDR.XTF.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        assert!(data.len() <= FIFO_BURST_SIZE);
        self.bus.fifo_write(Addressing::fifo(), data)
    }
}

///////////////////////////////////////////////////////////////////////
// Device

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Version {
    V2086_2186_V1_1,
    V2085_B1,
    V2085_B2,
    V2085_V2_3,
}

impl Version {
    pub fn from_rbch(rbch: RBCH) -> Self {
        match rbch.VN() {
            0 => Version::V2086_2186_V1_1,
            1 => Version::V2085_B1,
            2 => Version::V2085_B2,
            _ => Version::V2085_V2_3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Version::V2086_2186_V1_1 => "2086/2186 V1.1",
            Version::V2085_B1 => "2085 B1",
            Version::V2085_B2 => "2085 B2",
            Version::V2085_V2_3 => "2085 V2.3",
        }
    }
}

/// ISAC-S device interface
///
/// Several addresses carry a different register for reads and writes, so
/// there is one accessor per direction where that is the case.
///
pub struct Isac<B>
where B: Bus,
{
    bus: B,
}

impl<B> Isac<B>
where B: Bus,
{
    pub fn new(bus: B) -> Self {
        Self {
            bus,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    fn access<T>(&self, offset: usize) -> Access<'_, B, T> {
        Access::new(&self.bus, Addressing::register(offset))
    }

    pub fn fifo(&self) -> Fifo<'_, B> {
        Fifo::new(&self.bus)
    }

    // HDLC controller

    pub fn ista(&self) -> Access<B, ISTA>          { self.access(0x20) }
    pub fn mask(&self) -> Access<B, MASK>          { self.access(0x20) }
    pub fn star(&self) -> Access<B, STAR>          { self.access(0x21) }
    pub fn cmdr(&self) -> Access<B, CMDR>          { self.access(0x21) }
    pub fn mode(&self) -> Access<B, RegisterValue> { self.access(0x22) }
    pub fn timr(&self) -> Access<B, RegisterValue> { self.access(0x23) }
    pub fn exir(&self) -> Access<B, EXIR>          { self.access(0x24) }
    pub fn rbcl(&self) -> Access<B, RBCL>          { self.access(0x25) }
    pub fn rsta(&self) -> Access<B, RSTA>          { self.access(0x27) }
    pub fn rbch(&self) -> Access<B, RBCH>          { self.access(0x2a) }

    // Special purpose / IOM

    pub fn spcr(&self) -> Access<B, SPCR>          { self.access(0x30) }
    pub fn cir0(&self) -> Access<B, CIR0>          { self.access(0x31) }
    pub fn cix0(&self) -> Access<B, CIX0>          { self.access(0x31) }
    pub fn cir1(&self) -> Access<B, RegisterValue> { self.access(0x33) }
    pub fn stcr(&self) -> Access<B, RegisterValue> { self.access(0x37) }
    pub fn adf1(&self) -> Access<B, RegisterValue> { self.access(0x38) }
    pub fn adf2(&self) -> Access<B, RegisterValue> { self.access(0x39) }
    pub fn sqxr(&self) -> Access<B, RegisterValue> { self.access(0x3b) }

    // Monitor channel

    pub fn mosr(&self) -> Access<B, MOSR>          { self.access(0x3a) }
    pub fn mocr(&self) -> Access<B, MOCR>          { self.access(0x3a) }

    /// Monitor receive data register of channel `index`.
    pub fn mor(&self, index: usize) -> Access<B, RegisterValue> {
        const MAP: [usize; MONITOR_CHANNELS_COUNT] = [0x32, 0x34];
        assert!(index < MAP.len());
        self.access(MAP[index])
    }

    /// Monitor transmit data register of channel `index`.
    pub fn mox(&self, index: usize) -> Access<B, RegisterValue> {
        const MAP: [usize; MONITOR_CHANNELS_COUNT] = [0x32, 0x34];
        assert!(index < MAP.len());
        self.access(MAP[index])
    }

    /// Issue a layer 1 command through the C/I channel.
    pub fn command(&self, command: Command) -> Result<()> {
        self.cix0().set(CIX0::command(command))
    }
}

const REGISTERS_END: usize = 0x40;

/// ISAC register space addressing
///
/// 0x00..0x20 is the FIFO window, 0x20..0x40 the register file.
///
struct Addressing {}

impl Addressing {
    fn register(offset: usize) -> usize {
        assert!(offset >= 0x20);
        assert!(offset < REGISTERS_END);
        offset
    }

    fn fifo() -> RegisterAddress {
        0x00
    }
}
