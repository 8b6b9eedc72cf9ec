//! Reservation stations and load/store buffers.
//!
//! Every operand slot in this module holds *either* a known value *or* a
//! pending producer tag, never both live at once — modelled as the
//! `Operand` enum below instead of a `(value, Option<tag>)` pair that
//! would let both be populated simultaneously by mistake.
//!
//! Each slot carries a *reference* to its instruction — an index into the
//! engine's program vector — rather than an embedded copy. The program
//! vector is the sole, persistent owner of cycle stamps; a station/buffer
//! releasing back to the free pool does not erase the timing history the
//! way an embedded copy would.

use crate::tag::Tag;

/// One operand slot: either the value is already known, or a tag names
/// the producer that will eventually supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// The value is known.
    Ready(i64),
    /// Waiting on the named producer to broadcast a value.
    Waiting(Tag),
}

impl Operand {
    /// True if this operand still has a pending producer.
    #[must_use]
    pub const fn is_waiting(self) -> bool {
        matches!(self, Operand::Waiting(_))
    }

    /// The ready value, panicking if still waiting. Callers only reach for
    /// this after checking readiness (no pending tags).
    #[must_use]
    pub fn value(self) -> i64 {
        match self {
            Operand::Ready(v) => v,
            Operand::Waiting(tag) => panic!("operand still waiting on {tag}"),
        }
    }

    /// If this operand is waiting on `producer`, resolve it to `value`.
    /// No-op otherwise.
    pub fn resolve(&mut self, producer: Tag, value: i64) {
        if *self == Operand::Waiting(producer) {
            *self = Operand::Ready(value);
        }
    }
}

/// The lifecycle phase of a station or buffer slot, tracked explicitly
/// rather than inferred from a mix of booleans and cycle-stamp presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlotState {
    /// Not holding an instruction.
    Free,
    /// Holding an instruction, waiting on operands or a memory
    /// disambiguation condition before execution can start.
    Issued,
    /// Counting down towards completion.
    Executing,
    /// Countdown reached zero; waiting to win CDB arbitration (or, for a
    /// store, waiting to commit).
    Finished,
}

/// A reservation station: one in-flight ALU/FP operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReservationStation {
    /// This station's own stable identifier.
    pub tag: Tag,
    /// Lifecycle phase.
    pub state: SlotState,
    /// Index into the engine's program vector of the instruction
    /// occupying this station, if any.
    pub instruction: Option<usize>,
    /// First operand (`Vj`/`Qj`).
    pub vj: Operand,
    /// Second operand (`Vk`/`Qk`).
    pub vk: Operand,
    /// Immediate or branch target, copied from the instruction at issue.
    pub a: i64,
    /// Remaining execution cycles.
    pub remaining: u64,
}

impl ReservationStation {
    /// A free station with the given identifier.
    #[must_use]
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            state: SlotState::Free,
            instruction: None,
            vj: Operand::Ready(0),
            vk: Operand::Ready(0),
            a: 0,
            remaining: 0,
        }
    }

    /// True if this station holds an instruction (any state but `Free`).
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state != SlotState::Free
    }

    /// True if neither operand is still waiting on a producer.
    #[must_use]
    pub fn operands_ready(&self) -> bool {
        !self.vj.is_waiting() && !self.vk.is_waiting()
    }

    /// Release this station back to the free pool.
    pub fn release(&mut self) {
        *self = Self::new(self.tag);
    }
}

/// A load buffer entry: an in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadBuffer {
    /// This buffer's own stable identifier.
    pub tag: Tag,
    /// Lifecycle phase.
    pub state: SlotState,
    /// Index into the engine's program vector of the load instruction
    /// occupying this buffer, if any.
    pub instruction: Option<usize>,
    /// Byte offset added to the base register once it resolves. Effective
    /// address is `base value + offset`, computed eagerly at issue if the
    /// base is already known, or when the base's producer broadcasts.
    pub offset: i64,
    /// The effective address, or a pending tag for the base register.
    pub address: Operand,
    /// Remaining execution cycles.
    pub remaining: u64,
}

impl LoadBuffer {
    /// A free buffer with the given identifier.
    #[must_use]
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            state: SlotState::Free,
            instruction: None,
            offset: 0,
            address: Operand::Ready(0),
            remaining: 0,
        }
    }

    /// True if this buffer holds an instruction.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state != SlotState::Free
    }

    /// True if the effective address is known.
    #[must_use]
    pub fn address_ready(&self) -> bool {
        !self.address.is_waiting()
    }

    /// If the address is waiting on `producer`, resolve it to
    /// `base_value + offset`.
    pub fn resolve_address(&mut self, producer: Tag, base_value: i64) {
        if self.address == Operand::Waiting(producer) {
            self.address = Operand::Ready(base_value + self.offset);
        }
    }

    /// Release this buffer back to the free pool.
    pub fn release(&mut self) {
        *self = Self::new(self.tag);
    }
}

/// A store buffer entry: an in-flight store, tracked separately for
/// address and value because either may resolve before the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreBuffer {
    /// This buffer's own stable identifier.
    pub tag: Tag,
    /// Lifecycle phase.
    pub state: SlotState,
    /// Index into the engine's program vector of the store instruction
    /// occupying this buffer, if any.
    pub instruction: Option<usize>,
    /// Byte offset added to the base register once it resolves.
    pub offset: i64,
    /// The effective address, or a pending tag for the base register.
    pub address: Operand,
    /// The value to store, or a pending tag for the value register.
    pub value: Operand,
    /// Remaining execution cycles.
    pub remaining: u64,
}

impl StoreBuffer {
    /// A free buffer with the given identifier.
    #[must_use]
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            state: SlotState::Free,
            instruction: None,
            offset: 0,
            address: Operand::Ready(0),
            value: Operand::Ready(0),
            remaining: 0,
        }
    }

    /// True if this buffer holds an instruction.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state != SlotState::Free
    }

    /// True if both address and value are known — the condition under
    /// which a store may begin execution.
    #[must_use]
    pub fn ready(&self) -> bool {
        !self.address.is_waiting() && !self.value.is_waiting()
    }

    /// If the address is waiting on `producer`, resolve it to
    /// `base_value + offset`.
    pub fn resolve_address(&mut self, producer: Tag, base_value: i64) {
        if self.address == Operand::Waiting(producer) {
            self.address = Operand::Ready(base_value + self.offset);
        }
    }

    /// Release this buffer back to the free pool.
    pub fn release(&mut self) {
        *self = Self::new(self.tag);
    }
}
