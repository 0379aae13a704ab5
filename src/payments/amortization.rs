use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::schedule::{generate_due_dates, Periodicity};
use crate::types::AmortizationMethod;

/// one row of a simulated schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub beginning_balance: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub total: Money,
    pub remaining_balance: Money,
    pub cumulative_interest: Money,
    pub cumulative_principal: Money,
}

/// simulated schedule plus aggregate figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub method: AmortizationMethod,
    pub principal: Money,
    pub interest_rate: Rate,
    pub installment_count: u32,
    /// constant installment value for level methods, `None` when installments vary
    pub installment_value: Option<Money>,
    pub total_amount: Money,
    pub total_interest: Money,
    /// total interest over principal, in percent
    pub effective_rate: Decimal,
    pub installments: Vec<ScheduledInstallment>,
}

impl Simulation {
    /// get installment by 1-based number
    pub fn get_installment(&self, number: u32) -> Option<&ScheduledInstallment> {
        number
            .checked_sub(1)
            .and_then(|i| self.installments.get(i as usize))
    }

    /// value persisted on the loan: the level value, or the first installment otherwise
    pub fn reference_installment_value(&self) -> Money {
        self.installment_value
            .or_else(|| self.installments.first().map(|i| i.total))
            .unwrap_or(Money::ZERO)
    }

    pub fn due_dates(&self) -> Vec<NaiveDate> {
        self.installments.iter().map(|i| i.due_date).collect()
    }
}

/// amortization calculator
pub struct AmortizationCalculator {
    method: AmortizationMethod,
}

impl AmortizationCalculator {
    pub fn new(method: AmortizationMethod) -> Self {
        Self { method }
    }

    /// build the schedule over caller-supplied due dates
    pub fn simulate(
        &self,
        principal: Money,
        rate: Rate,
        installment_count: u32,
        due_dates: &[NaiveDate],
    ) -> Result<Simulation> {
        validate_inputs(principal, rate, installment_count, due_dates)?;

        let rows = match self.method {
            AmortizationMethod::Price => price_rows(principal, rate, due_dates)?,
            AmortizationMethod::Sac => sac_rows(principal, rate, due_dates),
            AmortizationMethod::SimpleInterest => simple_interest_rows(principal, rate, due_dates),
            AmortizationMethod::RecurringSimpleInterest => {
                recurring_interest_rows(principal, rate, due_dates)
            }
            AmortizationMethod::InterestOnly => interest_only_rows(principal, rate, due_dates),
        };

        let total_amount: Money = rows.iter().map(|r| r.total).sum();
        let total_interest: Money = rows.iter().map(|r| r.interest_portion).sum();
        let effective_rate = (total_interest.as_decimal() / principal.as_decimal()
            * Decimal::from(100))
        .round_dp(4);

        let installment_value = if self.method.is_level() {
            rows.first().map(|r| r.total)
        } else {
            None
        };

        Ok(Simulation {
            method: self.method,
            principal,
            interest_rate: rate,
            installment_count,
            installment_value,
            total_amount,
            total_interest,
            effective_rate,
            installments: rows,
        })
    }

    /// build the schedule with due dates drawn from a periodicity
    pub fn simulate_with_periodicity(
        &self,
        principal: Money,
        rate: Rate,
        installment_count: u32,
        periodicity: &Periodicity,
        first_due_date: NaiveDate,
    ) -> Result<Simulation> {
        validate_inputs(principal, rate, installment_count, &[])?;
        let due_dates = generate_due_dates(periodicity, first_due_date, installment_count)?;
        self.simulate(principal, rate, installment_count, &due_dates)
    }
}

/// constant installment `P * r * (1+r)^n / ((1+r)^n - 1)`, or `P / n` at zero rate
pub fn annuity_payment(principal: Money, rate: Rate, periods: u32) -> Result<Money> {
    if periods == 0 {
        return Ok(principal);
    }

    if rate.is_zero() {
        return Ok((principal / Decimal::from(periods)).round_cents());
    }

    let overflow = || {
        LedgerError::validation(format!(
            "installment for {} at {} over {} periods exceeds decimal range",
            principal, rate, periods
        ))
    };

    let compound = rate.compound_factor(periods).ok_or_else(overflow)?;
    let numerator = principal
        .as_decimal()
        .checked_mul(rate.as_decimal())
        .and_then(|v| v.checked_mul(compound))
        .ok_or_else(overflow)?;
    let denominator = compound - Decimal::ONE;
    let payment = numerator.checked_div(denominator).ok_or_else(overflow)?;

    Ok(Money::from_decimal(payment).round_cents())
}

fn validate_inputs(
    principal: Money,
    rate: Rate,
    installment_count: u32,
    due_dates: &[NaiveDate],
) -> Result<()> {
    if !principal.is_positive() {
        return Err(LedgerError::InvalidAmount { amount: principal });
    }
    if principal.round_cents() != principal {
        return Err(LedgerError::validation(format!(
            "principal {} has more precision than currency cents",
            principal
        )));
    }
    if installment_count == 0 {
        return Err(LedgerError::validation("installment count must be at least 1"));
    }
    if rate.is_negative() {
        return Err(LedgerError::InvalidInterestRate { rate });
    }
    // bounds the interest any method charges
    let interest_bound = principal
        .as_decimal()
        .checked_mul(rate.as_decimal())
        .and_then(|v| v.checked_mul(Decimal::from(installment_count)));
    if interest_bound.is_none() {
        return Err(LedgerError::validation(format!(
            "interest on {} at {} over {} periods exceeds decimal range",
            principal, rate, installment_count
        )));
    }
    if !due_dates.is_empty() {
        if due_dates.len() != installment_count as usize {
            return Err(LedgerError::validation(format!(
                "{} due dates supplied for {} installments",
                due_dates.len(),
                installment_count
            )));
        }
        if due_dates.windows(2).any(|w| w[1] < w[0]) {
            return Err(LedgerError::validation("due dates must be in ascending order"));
        }
    }
    Ok(())
}

/// accumulates rows and the running totals they carry
struct RowBuilder {
    rows: Vec<ScheduledInstallment>,
    balance: Money,
    cumulative_interest: Money,
    cumulative_principal: Money,
}

impl RowBuilder {
    fn new(principal: Money, capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            balance: principal,
            cumulative_interest: Money::ZERO,
            cumulative_principal: Money::ZERO,
        }
    }

    fn push(&mut self, due_date: NaiveDate, principal_portion: Money, interest_portion: Money) {
        let principal_portion = principal_portion.min(self.balance).max(Money::ZERO);
        let beginning_balance = self.balance;
        self.balance -= principal_portion;
        self.cumulative_interest += interest_portion;
        self.cumulative_principal += principal_portion;

        self.rows.push(ScheduledInstallment {
            number: self.rows.len() as u32 + 1,
            due_date,
            beginning_balance,
            principal_portion,
            interest_portion,
            total: principal_portion + interest_portion,
            remaining_balance: self.balance,
            cumulative_interest: self.cumulative_interest,
            cumulative_principal: self.cumulative_principal,
        });
    }

    fn finish(self) -> Vec<ScheduledInstallment> {
        self.rows
    }
}

/// even principal slice; the last period takes whatever balance remains
fn principal_slice(builder: &RowBuilder, slice: Money, is_last: bool) -> Money {
    if is_last {
        builder.balance
    } else {
        slice
    }
}

fn price_rows(
    principal: Money,
    rate: Rate,
    due_dates: &[NaiveDate],
) -> Result<Vec<ScheduledInstallment>> {
    let n = due_dates.len();
    let payment = annuity_payment(principal, rate, n as u32)?;
    let mut builder = RowBuilder::new(principal, n);

    for (i, due_date) in due_dates.iter().enumerate() {
        let interest = (builder.balance * rate.as_decimal()).round_cents();
        let principal_portion = principal_slice(&builder, payment - interest, i + 1 == n);
        builder.push(*due_date, principal_portion, interest);
    }

    Ok(builder.finish())
}

fn sac_rows(principal: Money, rate: Rate, due_dates: &[NaiveDate]) -> Vec<ScheduledInstallment> {
    let n = due_dates.len();
    // slices round down and the first period absorbs the remainder, so totals never rise
    let slice = Money::from_decimal(
        (principal.as_decimal() / Decimal::from(n as u32))
            .round_dp_with_strategy(2, RoundingStrategy::ToZero),
    );
    let first_slice = principal - slice * Decimal::from(n as u32 - 1);
    let mut builder = RowBuilder::new(principal, n);

    for (i, due_date) in due_dates.iter().enumerate() {
        let interest = (builder.balance * rate.as_decimal()).round_cents();
        let principal_portion = if i == 0 {
            first_slice
        } else {
            principal_slice(&builder, slice, i + 1 == n)
        };
        builder.push(*due_date, principal_portion, interest);
    }

    builder.finish()
}

fn simple_interest_rows(
    principal: Money,
    rate: Rate,
    due_dates: &[NaiveDate],
) -> Vec<ScheduledInstallment> {
    let n = due_dates.len();
    let slice = (principal / Decimal::from(n as u32)).round_cents();
    let total_interest = principal.simple_interest(rate, n as u32).round_cents();
    let interest_share = (total_interest / Decimal::from(n as u32)).round_cents();
    let mut builder = RowBuilder::new(principal, n);

    for (i, due_date) in due_dates.iter().enumerate() {
        let is_last = i + 1 == n;
        let interest = if is_last {
            total_interest - builder.cumulative_interest
        } else {
            interest_share
        };
        let principal_portion = principal_slice(&builder, slice, is_last);
        builder.push(*due_date, principal_portion, interest);
    }

    builder.finish()
}

fn recurring_interest_rows(
    principal: Money,
    rate: Rate,
    due_dates: &[NaiveDate],
) -> Vec<ScheduledInstallment> {
    let n = due_dates.len();
    let slice = (principal / Decimal::from(n as u32)).round_cents();
    let interest = principal.simple_interest(rate, 1).round_cents();
    let mut builder = RowBuilder::new(principal, n);

    for (i, due_date) in due_dates.iter().enumerate() {
        let principal_portion = principal_slice(&builder, slice, i + 1 == n);
        builder.push(*due_date, principal_portion, interest);
    }

    builder.finish()
}

fn interest_only_rows(
    principal: Money,
    rate: Rate,
    due_dates: &[NaiveDate],
) -> Vec<ScheduledInstallment> {
    let n = due_dates.len();
    let interest = principal.simple_interest(rate, 1).round_cents();
    let mut builder = RowBuilder::new(principal, n);

    for (i, due_date) in due_dates.iter().enumerate() {
        // balloon on the final period
        let principal_portion = principal_slice(&builder, Money::ZERO, i + 1 == n);
        builder.push(*due_date, principal_portion, interest);
    }

    builder.finish()
}
