//! Scriptable bus for exercising the channel without hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use isac_pac::device::{Bus, Error, RegisterAddress, RegisterValue, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Read(RegisterAddress),
    Write(RegisterAddress, RegisterValue),
    FifoRead(usize),
    FifoWrite(Vec<u8>),
}

#[derive(Default)]
struct Inner {
    /// One-shot values, consumed before falling back to `registers`.
    queued: HashMap<RegisterAddress, VecDeque<RegisterValue>>,
    registers: HashMap<RegisterAddress, RegisterValue>,
    fifo: VecDeque<u8>,
    ops: Vec<Op>,
    fail_fifo_write: bool,
    fail_register_write: Option<RegisterAddress>,
    fail_register_read: Option<RegisterAddress>,
}

#[derive(Clone, Default)]
pub(crate) struct MockBus(Arc<Mutex<Inner>>);

impl MockBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().unwrap()
    }

    /// Value returned by every read of `address` from now on.
    pub(crate) fn set(&self, address: RegisterAddress, value: RegisterValue) {
        self.inner().registers.insert(address, value);
    }

    /// Value returned by the next read of `address` only.
    pub(crate) fn push(&self, address: RegisterAddress, value: RegisterValue) {
        self.inner().queued.entry(address).or_default().push_back(value);
    }

    /// Bytes waiting in the receive FIFO.
    pub(crate) fn push_fifo(&self, data: &[u8]) {
        self.inner().fifo.extend(data);
    }

    pub(crate) fn fail_fifo_write(&self, fail: bool) {
        self.inner().fail_fifo_write = fail;
    }

    /// Reads of `address` fail until cleared with `None`.
    pub(crate) fn fail_register_read(&self, address: Option<RegisterAddress>) {
        self.inner().fail_register_read = address;
    }

    /// Writes to `address` fail until cleared with `None`.
    pub(crate) fn fail_register_write(&self, address: Option<RegisterAddress>) {
        self.inner().fail_register_write = address;
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.inner().ops.clone()
    }

    pub(crate) fn take_ops(&self) -> Vec<Op> {
        std::mem::take(&mut self.inner().ops)
    }

    /// Register writes only, in order.
    pub(crate) fn writes(&self) -> Vec<(RegisterAddress, RegisterValue)> {
        self.inner().ops.iter()
            .filter_map(|op| match op {
                Op::Write(address, value) => Some((*address, *value)),
                _ => None,
            })
            .collect()
    }

    /// Register writes to `address` only, in order.
    pub(crate) fn writes_to(&self, address: RegisterAddress) -> Vec<RegisterValue> {
        self.writes().into_iter()
            .filter(|&(a, _)| a == address)
            .map(|(_, v)| v)
            .collect()
    }

    pub(crate) fn fifo_writes(&self) -> Vec<Vec<u8>> {
        self.inner().ops.iter()
            .filter_map(|op| match op {
                Op::FifoWrite(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Bus for MockBus {
    fn register_read(&self, address: RegisterAddress) -> Result<RegisterValue> {
        let mut inner = self.inner();
        if inner.fail_register_read == Some(address) {
            return Err(Error::Register { address });
        }
        inner.ops.push(Op::Read(address));
        let queued = inner.queued.get_mut(&address).and_then(|q| q.pop_front());
        Ok(queued.unwrap_or_else(|| inner.registers.get(&address).copied().unwrap_or(0)))
    }

    fn register_write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()> {
        let mut inner = self.inner();
        if inner.fail_register_write == Some(address) {
            return Err(Error::Register { address });
        }
        inner.ops.push(Op::Write(address, value));
        Ok(())
    }

    fn fifo_read(&self, _address: RegisterAddress, data: &mut [u8]) -> Result<()> {
        let mut inner = self.inner();
        inner.ops.push(Op::FifoRead(data.len()));
        for byte in data.iter_mut() {
            *byte = inner.fifo.pop_front().unwrap_or(0);
        }
        Ok(())
    }

    fn fifo_write(&self, _address: RegisterAddress, data: &[u8]) -> Result<()> {
        let mut inner = self.inner();
        if inner.fail_fifo_write {
            return Err(Error::Fifo { length: data.len() });
        }
        inner.ops.push(Op::FifoWrite(data.to_vec()));
        Ok(())
    }
}
