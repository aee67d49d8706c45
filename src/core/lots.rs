use super::gains::GainsError;
use super::transaction::Transaction;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Lot selection policy, deciding which open lot a disposal consumes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// Highest per-unit value first. Also selected by the legacy name `FIHO`.
    #[default]
    Hifo,
    /// Oldest lot first.
    Fifo,
    /// Newest lot first.
    Lifo,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FIHO" | "HIFO" => Ok(Algorithm::Hifo),
            "FIFO" => Ok(Algorithm::Fifo),
            "LIFO" => Ok(Algorithm::Lifo),
            _ => Err(format!("unknown lot selection algorithm: {s}")),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Hifo => write!(f, "HIFO"),
            Algorithm::Fifo => write!(f, "FIFO"),
            Algorithm::Lifo => write!(f, "LIFO"),
        }
    }
}

/// Heap key; the greatest key is popped first. All lots in one book share the
/// same variant. Sequence numbers are unique so keys never tie.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Priority {
    /// Highest value, then earliest date, then earliest insertion.
    /// Unvalued lots (`None`) come last.
    Hifo(Option<Decimal>, Reverse<NaiveDateTime>, Reverse<u64>),
    Fifo(Reverse<NaiveDateTime>, Reverse<u64>),
    Lifo(NaiveDateTime, u64),
}

impl Priority {
    fn of(algorithm: Algorithm, lot: &Transaction, seq: u64) -> Self {
        match algorithm {
            Algorithm::Hifo => Priority::Hifo(lot.value, Reverse(lot.date), Reverse(seq)),
            Algorithm::Fifo => Priority::Fifo(Reverse(lot.date), Reverse(seq)),
            Algorithm::Lifo => Priority::Lifo(lot.date, seq),
        }
    }
}

/// A lot taken out of the book. It keeps its insertion sequence so that a
/// partially consumed remainder goes back in the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenLot {
    seq: u64,
    pub lot: Transaction,
}

impl OpenLot {
    /// The same lot with `matched` units removed.
    pub fn reduced(&self, matched: Decimal) -> OpenLot {
        OpenLot {
            seq: self.seq,
            lot: self.lot.with_amount(self.lot.amount - matched),
        }
    }
}

#[derive(Debug)]
struct QueuedLot {
    priority: Priority,
    open: OpenLot,
}

impl PartialEq for QueuedLot {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for QueuedLot {}

impl PartialOrd for QueuedLot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedLot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

/// Open acquisition lots, one priority queue per currency.
#[derive(Debug, Default)]
pub struct LotBook {
    algorithm: Algorithm,
    queues: HashMap<String, BinaryHeap<QueuedLot>>,
    next_seq: u64,
}

impl LotBook {
    pub fn new(algorithm: Algorithm) -> Self {
        LotBook {
            algorithm,
            queues: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Add a newly acquired lot.
    pub fn push(&mut self, lot: Transaction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.restore(OpenLot { seq, lot });
    }

    /// Put a lot taken with [`LotBook::pop_next`] back into the book.
    pub fn restore(&mut self, open: OpenLot) {
        log::debug!(
            "Lot {} PUSH: amount={}, value={:?}, date={}",
            open.lot.currency,
            open.lot.amount,
            open.lot.value,
            open.lot.date
        );
        let priority = Priority::of(self.algorithm, &open.lot, open.seq);
        self.queues
            .entry(open.lot.currency.clone())
            .or_default()
            .push(QueuedLot { priority, open });
    }

    /// Remove the next lot for `currency` according to the selection policy.
    ///
    /// `date` and `shortfall` describe the disposal being matched and are only
    /// used to report an empty book.
    pub fn pop_next(
        &mut self,
        currency: &str,
        date: NaiveDateTime,
        shortfall: Decimal,
    ) -> Result<OpenLot, GainsError> {
        self.queues
            .get_mut(currency)
            .and_then(BinaryHeap::pop)
            .map(|queued| queued.open)
            .ok_or_else(|| GainsError::InsufficientBasis {
                currency: currency.to_string(),
                date,
                shortfall,
            })
    }

    /// Total open quantity held for `currency`.
    pub fn holdings(&self, currency: &str) -> Decimal {
        self.queues
            .get(currency)
            .map(|queue| queue.iter().map(|q| q.open.lot.amount).sum())
            .unwrap_or(Decimal::ZERO)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queues.values().map(BinaryHeap::len).sum()
    }

    /// All open lots across currencies, oldest first. Lots with equal dates
    /// keep the order in which they were first pushed.
    pub fn into_open_lots(self) -> Vec<Transaction> {
        let mut open: Vec<OpenLot> = self
            .queues
            .into_values()
            .flat_map(BinaryHeap::into_vec)
            .map(|queued| queued.open)
            .collect();
        open.sort_by_key(|o| (o.lot.date, o.seq));
        open.into_iter().map(|o| o.lot).collect()
    }
}
