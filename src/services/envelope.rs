//! Envelope allocator
//!
//! Derives an envelope's period timeline, computes allocated / consumed /
//! remaining per period (with optional carry-over), and records allocations
//! and envelope-to-envelope transfers.
//!
//! Period timeline: explicit allocations pin their own periods. Between and
//! after them, periods are stepped from the day after the previous
//! allocation ends; before the first allocation they are counted back from
//! its start; with no allocations at all the envelope's anchor date is used.
//! The last derived period before an allocation is cut short so the
//! timeline never overlaps or leaves a gap.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::expander::period_containing;
use crate::config::EnvelopeTransferPolicy;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    EntityRef, Envelope, EnvelopeAllocation, EnvelopeId, EnvelopeTransfer, EnvelopeTransferId,
    IncomeId, Money, Period,
};
use crate::storage::{Dataset, DeleteOutcome, Storage};

/// Computed budget position of one envelope for one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeStatus {
    pub envelope_id: EnvelopeId,
    pub period: Period,
    pub allocated: Money,
    pub consumed: Money,
    pub remaining: Money,
    /// Part of `allocated` carried in from the previous period
    pub carried_over: Money,
    /// `allocated` comes from an explicit allocation row
    pub explicitly_funded: bool,
}

impl EnvelopeStatus {
    pub fn is_over_budget(&self) -> bool {
        self.remaining.is_negative()
    }
}

/// Spending charged to one envelope over a range
#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeSpending {
    pub envelope_id: EnvelopeId,
    pub name: String,
    pub spent: Money,
    pub entry_count: usize,
}

fn day_after(date: NaiveDate) -> EngineResult<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| EngineError::Config(format!("No date after {}", date)))
}

fn day_before(date: NaiveDate) -> EngineResult<NaiveDate> {
    date.pred_opt()
        .ok_or_else(|| EngineError::Config(format!("No date before {}", date)))
}

/// The period of `envelope` that contains `date`
pub fn period_for(data: &Dataset, envelope: &Envelope, date: NaiveDate) -> EngineResult<Period> {
    let allocations = data.allocations_for(envelope.id);
    if let Some(row) = allocations.iter().find(|a| a.period.contains(date)) {
        return Ok(row.period);
    }

    let previous = allocations.iter().rev().find(|a| a.period.end < date);
    let next = allocations.iter().find(|a| a.period.start > date);
    let kind = envelope.period_kind;

    let period = match (previous, next) {
        (Some(prev), _) => period_containing(kind, day_after(prev.period.end)?, date)?,
        (None, Some(next)) => period_containing(kind, next.period.start, date)?,
        (None, None) => period_containing(kind, envelope.anchor_date, date)?,
    };

    match next {
        Some(next) if period.end >= next.period.start => {
            Period::new(period.start, day_before(next.period.start)?)
        }
        _ => Ok(period),
    }
}

/// Every period of `envelope` overlapping `range`, in order
pub fn periods_for(data: &Dataset, envelope: &Envelope, range: Period) -> EngineResult<Vec<Period>> {
    let mut periods = Vec::new();
    let mut current = period_for(data, envelope, range.start)?;
    loop {
        periods.push(current);
        if current.end >= range.end {
            break;
        }
        current = period_for(data, envelope, day_after(current.end)?)?;
    }
    Ok(periods)
}

/// The earliest period that can carry anything forward
fn first_period(data: &Dataset, envelope: &Envelope) -> EngineResult<Period> {
    let earliest = data
        .allocations_for(envelope.id)
        .first()
        .map_or(envelope.anchor_date, |a| a.period.start.min(envelope.anchor_date));
    period_for(data, envelope, earliest)
}

/// Status of a single period given the carry-in from the one before
fn period_status(
    data: &Dataset,
    envelope: &Envelope,
    period: Period,
    carry_in: Money,
) -> EngineResult<EnvelopeStatus> {
    let overflow = || EngineError::overflow(format!("envelope {} for {}", envelope.name, period));
    let spent = Money::try_sum(data.envelope_expenses(envelope.id, period).map(|t| t.amount));
    let transferred = Money::try_sum(
        data.transfers_for(envelope.id, period)
            .map(|t| t.consumption_delta(envelope.id)),
    );
    let consumed = spent
        .zip(transferred)
        .and_then(|(spent, transferred)| spent.checked_add(transferred))
        .ok_or_else(overflow)?;

    let (allocated, carried_over, explicitly_funded) = match data
        .allocations_for(envelope.id)
        .into_iter()
        .find(|a| a.period.contains(period.start))
    {
        Some(row) => (row.amount, Money::zero(), true),
        None => (
            envelope.budgeted_amount.checked_add(carry_in).ok_or_else(overflow)?,
            carry_in,
            false,
        ),
    };

    Ok(EnvelopeStatus {
        envelope_id: envelope.id,
        period,
        allocated,
        consumed,
        remaining: allocated.checked_sub(consumed).ok_or_else(overflow)?,
        carried_over,
        explicitly_funded,
    })
}

/// Allocated, consumed and remaining for the period containing `date`
///
/// With carry-over enabled, unspent remainders are rolled forward period by
/// period from the envelope's first period; an overspent period carries
/// nothing.
pub fn status_for(data: &Dataset, envelope: &Envelope, date: NaiveDate) -> EngineResult<EnvelopeStatus> {
    let target = period_for(data, envelope, date)?;
    if !envelope.carry_over {
        return period_status(data, envelope, target, Money::zero());
    }

    let mut period = first_period(data, envelope)?;
    if target.start <= period.start {
        return period_status(data, envelope, target, Money::zero());
    }

    let mut status = period_status(data, envelope, period, Money::zero())?;
    while period.start < target.start {
        period = period_for(data, envelope, day_after(period.end)?)?;
        status = period_status(data, envelope, period, status.remaining.non_negative())?;
    }
    Ok(status)
}

/// Service for envelopes, allocations and envelope transfers
pub struct EnvelopeService<'a> {
    storage: &'a Storage,
    transfer_policy: EnvelopeTransferPolicy,
}

impl<'a> EnvelopeService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            transfer_policy: EnvelopeTransferPolicy::default(),
        }
    }

    pub fn with_transfer_policy(mut self, policy: EnvelopeTransferPolicy) -> Self {
        self.transfer_policy = policy;
        self
    }

    /// Create a new envelope
    pub fn create(&self, envelope: Envelope) -> EngineResult<Envelope> {
        envelope.validate()?;
        let created = envelope.clone();
        self.storage.write(|txn| {
            if txn
                .envelopes
                .iter()
                .any(|e| e.name.eq_ignore_ascii_case(&envelope.name))
            {
                return Err(EngineError::duplicate("Envelope", &envelope.name));
            }
            if let Some(account) = envelope.account_id {
                txn.ensure_reference(EntityRef::Account(account))?;
            }
            txn.insert(envelope)
        })?;
        info!(envelope = %created.id, name = %created.name, "envelope created");
        Ok(created)
    }

    pub fn get(&self, id: EnvelopeId) -> EngineResult<Envelope> {
        self.storage.read(|data| data.envelopes.require(id).cloned())?
    }

    /// Find an envelope by name (case-insensitive) or ID string
    pub fn find(&self, identifier: &str) -> EngineResult<Option<Envelope>> {
        self.storage.read(|data| {
            data.envelopes
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(identifier))
                .or_else(|| {
                    identifier
                        .parse::<EnvelopeId>()
                        .ok()
                        .and_then(|id| data.envelopes.get(id))
                })
                .cloned()
        })
    }

    pub fn list(&self, include_inactive: bool) -> EngineResult<Vec<Envelope>> {
        self.storage.read(|data| {
            let mut envelopes: Vec<Envelope> = data
                .envelopes
                .iter()
                .filter(|e| include_inactive || e.active)
                .cloned()
                .collect();
            envelopes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            envelopes
        })
    }

    pub fn update(&self, mut envelope: Envelope) -> EngineResult<Envelope> {
        envelope.validate()?;
        envelope.updated_at = Utc::now();
        let updated = envelope.clone();
        self.storage.write(|txn| {
            if let Some(account) = envelope.account_id {
                txn.ensure_reference(EntityRef::Account(account))?;
            }
            txn.update(envelope)
        })?;
        Ok(updated)
    }

    pub fn set_active(&self, id: EnvelopeId, active: bool) -> EngineResult<Envelope> {
        self.storage.write(|txn| {
            txn.modify::<Envelope>(id, |e| {
                e.active = active;
                e.updated_at = Utc::now();
            })
        })
    }

    /// Delete an envelope with its allocations, transfers and rules
    ///
    /// Tagged ledger entries stay, untagged.
    pub fn delete(&self, id: EnvelopeId) -> EngineResult<DeleteOutcome> {
        self.storage.write(|txn| txn.delete(EntityRef::Envelope(id)))
    }

    /// The period containing `date`
    pub fn period_containing(&self, id: EnvelopeId, date: NaiveDate) -> EngineResult<Period> {
        self.storage.read(|data| {
            let envelope = data.envelopes.require(id)?;
            period_for(data, envelope, date)
        })?
    }

    /// Periods overlapping a range
    pub fn periods(&self, id: EnvelopeId, range: Period) -> EngineResult<Vec<Period>> {
        self.storage.read(|data| {
            let envelope = data.envelopes.require(id)?;
            periods_for(data, envelope, range)
        })?
    }

    /// Allocated, consumed and remaining for the period containing `date`
    pub fn status_for_period(&self, id: EnvelopeId, date: NaiveDate) -> EngineResult<EnvelopeStatus> {
        self.storage.read(|data| {
            let envelope = data.envelopes.require(id)?;
            status_for(data, envelope, date)
        })?
    }

    /// Status of every period overlapping a range
    pub fn history(&self, id: EnvelopeId, range: Period) -> EngineResult<Vec<EnvelopeStatus>> {
        self.storage.read(|data| {
            let envelope = data.envelopes.require(id)?;
            periods_for(data, envelope, range)?
                .into_iter()
                .map(|p| status_for(data, envelope, p.start))
                .collect()
        })?
    }

    /// Current status of every active envelope
    pub fn overview(&self, date: NaiveDate) -> EngineResult<Vec<(Envelope, EnvelopeStatus)>> {
        let envelopes = self.list(false)?;
        self.storage.read(|data| {
            envelopes
                .into_iter()
                .map(|e| {
                    let status = status_for(data, &e, date)?;
                    Ok((e, status))
                })
                .collect()
        })?
    }

    /// Fund the period containing `date` with an explicit amount
    pub fn allocate(
        &self,
        id: EnvelopeId,
        date: NaiveDate,
        amount: Money,
        income: Option<IncomeId>,
    ) -> EngineResult<EnvelopeAllocation> {
        if amount.is_negative() {
            return Err(EngineError::Validation(format!(
                "Allocation amount cannot be negative: {}",
                amount
            )));
        }

        self.storage.write(|txn| {
            let envelope = txn.envelopes.require(id)?.clone();
            if let Some(income) = income {
                txn.ensure_reference(EntityRef::Income(income))?;
            }

            let period = period_for(txn, &envelope, date)?;
            if txn.allocation_starting(id, period.start).is_some() {
                return Err(EngineError::duplicate(
                    "EnvelopeAllocation",
                    format!("{} for {}", envelope.name, period),
                ));
            }

            let mut row = EnvelopeAllocation::new(id, period, amount);
            row.income_id = income;
            txn.insert(row.clone())?;
            debug!(envelope = %id, period = %period, amount = %amount, "allocated");
            Ok(row)
        })
    }

    /// Remove the allocation for the period containing `date`
    pub fn remove_allocation(&self, id: EnvelopeId, date: NaiveDate) -> EngineResult<EnvelopeAllocation> {
        self.storage.write(|txn| {
            let row = txn
                .allocations_for(id)
                .into_iter()
                .find(|a| a.period.contains(date))
                .cloned()
                .ok_or_else(|| EngineError::not_found("EnvelopeAllocation", format!("{} on {}", id, date)))?;
            txn.delete(EntityRef::Allocation(row.id))?;
            Ok(row)
        })
    }

    /// Move budget capacity from one envelope to another
    ///
    /// The source's consumption rises by `amount` and the destination's
    /// falls by the same; account balances are untouched.
    pub fn transfer(
        &self,
        from: EnvelopeId,
        to: EnvelopeId,
        amount: Money,
        date: NaiveDate,
        description: Option<String>,
    ) -> EngineResult<EnvelopeTransfer> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(format!(
                "Transfer amount must be positive: {}",
                amount
            )));
        }
        if from == to {
            return Err(EngineError::Validation(
                "Cannot transfer to the same envelope".into(),
            ));
        }

        let policy = self.transfer_policy;
        let transfer = self.storage.write(|txn| {
            txn.ensure_reference(EntityRef::Envelope(from))?;
            txn.ensure_reference(EntityRef::Envelope(to))?;

            if policy == EnvelopeTransferPolicy::ForbidOverBudget {
                let data: &Dataset = txn;
                let source = data.envelopes.require(from)?;
                let status = status_for(data, source, date)?;
                if status.remaining.checked_sub(amount).map_or(true, |left| left.is_negative()) {
                    return Err(EngineError::Validation(format!(
                        "Envelope '{}' has {} remaining, cannot transfer {}",
                        source.name, status.remaining, amount
                    )));
                }
            }

            let mut transfer = EnvelopeTransfer::new(from, to, amount, date);
            transfer.description = description;
            txn.insert(transfer.clone())?;
            Ok(transfer)
        })?;

        info!(from = %from, to = %to, amount = %amount, "envelope transfer");
        Ok(transfer)
    }

    pub fn remove_transfer(&self, id: EnvelopeTransferId) -> EngineResult<()> {
        self.storage.write(|txn| {
            txn.delete(EntityRef::EnvelopeTransfer(id))?;
            Ok(())
        })
    }

    /// Tagged spending per envelope over a range, largest first
    pub fn spending_by_envelope(&self, range: Period) -> EngineResult<Vec<EnvelopeSpending>> {
        self.storage.read(|data| {
            let mut rows = Vec::new();
            for e in data.envelopes.iter() {
                let entries: Vec<Money> = data.envelope_expenses(e.id, range).map(|t| t.amount).collect();
                if entries.is_empty() {
                    continue;
                }
                let spent = Money::try_sum(entries.iter().copied())
                    .ok_or_else(|| EngineError::overflow(format!("spending for {}", e.name)))?;
                rows.push(EnvelopeSpending {
                    envelope_id: e.id,
                    name: e.name.clone(),
                    spent,
                    entry_count: entries.len(),
                });
            }
            rows.sort_by(|a, b| b.spent.cmp(&a.spent).then(a.name.cmp(&b.name)));
            Ok(rows)
        })?
    }
}
