//! MSI-X capability
//!
//! ```ignore
//!         31                  16 15           8 7            0
//!         +---------------------+--------------+--------------+
//! cap+0x0 |   Message Control   | Next Pointer |  Cap ID 0x11 |
//! cap+0x4 |            Table Offset                     | BIR |
//! cap+0x8 |             PBA Offset                      | BIR |
//!         +---------------------------------------------------+
//! ```
//!
//! Table and PBA placement always uses the BIR encoding: the low 3 bits of
//! each field select a BAR and the remaining bits are an 8 byte aligned
//! offset into it. Callers supply both through [`MsixRegion`].

use core::ops::Range;

use bit_field::BitField;
use x86_64::PhysAddr;

use crate::{
    cap::MSIX_ID,
    error::{PciError, Result},
    function::PciFunction,
    memory::MemoryAccess,
    transport::ConfigSpaceTransport,
};

/// The table size field is 11 bits wide and encodes N-1.
pub const MAX_VECTORS: u16 = 2048;

const CONTROL_OFFSET: u8 = 0x02;
const TABLE_OFFSET: u8 = 0x04;
const PBA_OFFSET: u8 = 0x08;

const CONTROL_TABLE_SIZE: Range<usize> = 0..11;
const CONTROL_FUNCTION_MASK: usize = 14;
const CONTROL_ENABLE: usize = 15;

/// Bytes from the capability header through the PBA Offset/BIR field.
const CAPABILITY_LEN: u8 = 12;
/// Highest offset at which the whole structure still fits in config space.
const MAX_CAP_OFFSET: u8 = u8::MAX - (CAPABILITY_LEN - 1);

const TABLE_ENTRY_SIZE: u64 = 16;
const ENTRY_ADDRESS_LOW: u64 = 0x0;
const ENTRY_ADDRESS_HIGH: u64 = 0x4;
const ENTRY_DATA: u64 = 0x8;
const ENTRY_VECTOR_CONTROL: u64 = 0xc;
const VECTOR_CONTROL_MASKED: u32 = 1;

const BIR_BITS: u32 = 0b111;
const MAX_BIR: u8 = 5;

/// A BAR index plus an 8 byte aligned offset into that BAR.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MsixRegion {
    bir: u8,
    offset: u32,
}

impl MsixRegion {
    pub fn new(bir: u8, offset: u32) -> Result<Self> {
        if bir > MAX_BIR || offset & BIR_BITS != 0 {
            return Err(PciError::InvalidRegion);
        }
        Ok(Self { bir, offset })
    }

    /// Decodes a Table or PBA Offset/BIR field.
    pub fn from_raw(raw: u32) -> Result<Self> {
        Self::new((raw & BIR_BITS) as u8, raw & !BIR_BITS)
    }

    pub fn raw(&self) -> u32 {
        self.offset | u32::from(self.bir)
    }

    pub fn bir(&self) -> u8 {
        self.bir
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn resolve<T: ConfigSpaceTransport>(&self, function: &PciFunction<'_, T>) -> Result<PhysAddr> {
        let bar = function.bar_address(self.bir)?;
        PhysAddr::try_new(bar.as_u64() + u64::from(self.offset))
            .map_err(|_| PciError::InvalidRegion)
    }
}

/// Width used to update the pending bit array.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PbaAccess {
    Qword,
    Dword,
}

impl PbaAccess {
    fn bits(&self) -> usize {
        match self {
            PbaAccess::Qword => 64,
            PbaAccess::Dword => 32,
        }
    }
}

/// Location of one vector's bit in the pending bit array.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PendingBit {
    /// Index of the qword or dword, depending on the access width.
    pub word: usize,
    pub bit: usize,
}

impl PendingBit {
    pub fn new(access: PbaAccess, vector: u16) -> Self {
        let vector = usize::from(vector);
        Self {
            word: vector / access.bits(),
            bit: vector % access.bits(),
        }
    }
}

/// Message written to each table entry. Entry `k` receives `data + k`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MsixMessage {
    pub address: u64,
    pub data: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MsixSetup {
    pub table: MsixRegion,
    pub pba: MsixRegion,
    pub message: MsixMessage,
    pub pba_access: PbaAccess,
    /// Leave table entries unmasked after programming.
    pub unmasked: bool,
}

/// Result of a successful [`enable_msix`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MsixCapabilityState {
    pub cap_offset: u8,
    pub vector_count: u16,
    pub table: MsixRegion,
    pub pba: MsixRegion,
    pub table_base: PhysAddr,
    pub pba_base: PhysAddr,
    pub enabled: bool,
}

impl MsixCapabilityState {
    pub fn entry_address(&self, vector: u16) -> PhysAddr {
        self.table_base + u64::from(vector) * TABLE_ENTRY_SIZE
    }
}

/// The MSI-X capability as the device currently reports it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MsixLayout {
    pub cap_offset: u8,
    /// Number of table entries (the encoded field plus one).
    pub table_size: u16,
    pub enabled: bool,
    pub function_masked: bool,
    pub table: MsixRegion,
    pub pba: MsixRegion,
}

fn msix_offset<T: ConfigSpaceTransport>(function: &PciFunction<'_, T>) -> Result<u8> {
    if !function.is_present() {
        return Err(PciError::DeviceAbsent);
    }
    let cap_offset = function
        .find_capability(MSIX_ID)?
        .ok_or(PciError::CapabilityNotFound)?;
    if cap_offset > MAX_CAP_OFFSET {
        log::warn!(
            "{}: msix capability at 0x{:02x} runs past config space",
            function.locator(),
            cap_offset
        );
        return Err(PciError::MalformedCapabilityChain);
    }
    Ok(cap_offset)
}

pub fn read_msix_layout<T: ConfigSpaceTransport>(
    function: &PciFunction<'_, T>,
) -> Result<MsixLayout> {
    let cap_offset = msix_offset(function)?;
    let control = function.read16(cap_offset + CONTROL_OFFSET);
    Ok(MsixLayout {
        cap_offset,
        table_size: control.get_bits(CONTROL_TABLE_SIZE) + 1,
        enabled: control.get_bit(CONTROL_ENABLE),
        function_masked: control.get_bit(CONTROL_FUNCTION_MASK),
        table: MsixRegion::from_raw(function.read32(cap_offset + TABLE_OFFSET))?,
        pba: MsixRegion::from_raw(function.read32(cap_offset + PBA_OFFSET))?,
    })
}

/// Enables MSI-X with `vector_count` vectors.
///
/// Programs message control (table size, enable), the Table and PBA
/// Offset/BIR fields, every table entry and the pending bit of every vector.
/// Nothing is rolled back if a later step fails; every write is idempotent,
/// so running again to completion repairs a partial setup.
pub fn enable_msix<T: ConfigSpaceTransport, M: MemoryAccess>(
    function: &PciFunction<'_, T>,
    vector_count: u16,
    setup: &MsixSetup,
    memory: &M,
) -> Result<MsixCapabilityState> {
    if vector_count == 0 || vector_count > MAX_VECTORS {
        return Err(PciError::InvalidVectorCount(vector_count));
    }

    let cap_offset = msix_offset(function)?;
    let table_base = setup.table.resolve(function)?;
    let pba_base = setup.pba.resolve(function)?;
    log::debug!(
        "{}: msix at 0x{:02x}, {} vectors, table {:#x}, pba {:#x}",
        function.locator(),
        cap_offset,
        vector_count,
        table_base.as_u64(),
        pba_base.as_u64()
    );

    let mut dword = function.read32(cap_offset + CONTROL_OFFSET);
    let mut control = dword.get_bits(16..32) as u16;
    control.set_bits(CONTROL_TABLE_SIZE, vector_count - 1);
    control.set_bit(CONTROL_ENABLE, true);
    dword.set_bits(16..32, control.into());
    function.write32(cap_offset + CONTROL_OFFSET, dword);

    function.write32(cap_offset + TABLE_OFFSET, setup.table.raw());
    function.write32(cap_offset + PBA_OFFSET, setup.pba.raw());

    let state = MsixCapabilityState {
        cap_offset,
        vector_count,
        table: setup.table,
        pba: setup.pba,
        table_base,
        pba_base,
        enabled: true,
    };

    for vector in 0..vector_count {
        write_table_entry(memory, &state, vector, &setup.message, !setup.unmasked);
        match setup.pba_access {
            PbaAccess::Qword => set_pending_qword(memory, pba_base, vector),
            PbaAccess::Dword => set_pending_dword(memory, pba_base, vector),
        }
    }

    Ok(state)
}

/// Clears the MSI-X enable bit, leaving the rest of the capability alone.
pub fn disable_msix<T: ConfigSpaceTransport>(function: &PciFunction<'_, T>) -> Result<()> {
    let cap_offset = msix_offset(function)?;
    let mut control = function.read16(cap_offset + CONTROL_OFFSET);
    control.set_bit(CONTROL_ENABLE, false);
    function.write16(cap_offset + CONTROL_OFFSET, control);
    Ok(())
}

fn write_table_entry<M: MemoryAccess>(
    memory: &M,
    state: &MsixCapabilityState,
    vector: u16,
    message: &MsixMessage,
    masked: bool,
) {
    let entry = state.entry_address(vector);
    memory.write32(entry + ENTRY_ADDRESS_LOW, message.address as u32);
    memory.write32(entry + ENTRY_ADDRESS_HIGH, (message.address >> 32) as u32);
    memory.write32(
        entry + ENTRY_DATA,
        message.data.wrapping_add(u32::from(vector)),
    );
    let control = if masked { VECTOR_CONTROL_MASKED } else { 0 };
    memory.write32(entry + ENTRY_VECTOR_CONTROL, control);
}

pub fn mask_vector<M: MemoryAccess>(memory: &M, state: &MsixCapabilityState, vector: u16) {
    let address = state.entry_address(vector) + ENTRY_VECTOR_CONTROL;
    let control = memory.read32(address);
    memory.write32(address, control | VECTOR_CONTROL_MASKED);
}

pub fn unmask_vector<M: MemoryAccess>(memory: &M, state: &MsixCapabilityState, vector: u16) {
    let address = state.entry_address(vector) + ENTRY_VECTOR_CONTROL;
    let control = memory.read32(address);
    memory.write32(address, control & !VECTOR_CONTROL_MASKED);
}

/// Sets `vector`'s pending bit using 64-bit accesses.
///
/// Bring-up placeholder only; at runtime the device owns these bits.
pub fn set_pending_qword<M: MemoryAccess>(memory: &M, pba_base: PhysAddr, vector: u16) {
    let pending = PendingBit::new(PbaAccess::Qword, vector);
    let address = pba_base + pending.word as u64 * 8;
    let mut word = memory.read64(address);
    word.set_bit(pending.bit, true);
    memory.write64(address, word);
}

/// Sets `vector`'s pending bit using 32-bit accesses.
pub fn set_pending_dword<M: MemoryAccess>(memory: &M, pba_base: PhysAddr, vector: u16) {
    let pending = PendingBit::new(PbaAccess::Dword, vector);
    let address = pba_base + pending.word as u64 * 4;
    let mut word = memory.read32(address);
    word.set_bit(pending.bit, true);
    memory.write32(address, word);
}
