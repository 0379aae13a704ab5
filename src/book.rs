use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::cashflow::{split_commission, CashFlowEntry, CashFlowJournal, CommissionSplit, Creditor, Route};
use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::installment::Installment;
use crate::interest::{FineAssessment, FineEngine};
use crate::loan::{Loan, LoanRequest, LoanSummary, RenewalDraft};
use crate::payments::{AmortizationCalculator, PartialPaymentStrategy, PaymentRequest, Simulation};
use crate::schedule::{generate_due_dates, today, Periodicity};
use crate::serialization::LoanView;
use crate::state::BookState;
use crate::types::{
    CreditorId, EntryCategory, EntryDirection, InstallmentId, LoanId, LoanStatus, PeriodicityId,
    RouteId,
};

/// result of settling every open installment of a loan
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub loan: Loan,
    pub installments: Vec<Installment>,
    pub renewal: RenewalDraft,
}

/// persisted store of loans, installments and creditor cash flow
///
/// Every mutation runs through [`LoanBook::transact`]: the body works on a staged copy
/// of the state and the copy replaces the live state only when the body succeeds.
/// Events raised by a failed body are dropped with it.
pub struct LoanBook {
    state: BookState,
    config: EngineConfig,
    events: EventStore,
}

/// staged state handed to a transaction body
struct Txn<'a> {
    state: &'a mut BookState,
    config: &'a EngineConfig,
    events: Vec<Event>,
}

impl LoanBook {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::from_state(BookState::default(), config)
    }

    /// open a book over existing state, checking its integrity first
    pub fn from_state(state: BookState, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        state.check_integrity()?;
        Ok(Self {
            state,
            config,
            events: EventStore::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &BookState {
        &self.state
    }

    pub fn journal(&self) -> &CashFlowJournal {
        &self.state.journal
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    fn transact<T>(
        &mut self,
        operation: &str,
        body: impl FnOnce(&mut Txn<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut staged = self.state.clone();
        let mut txn = Txn {
            state: &mut staged,
            config: &self.config,
            events: Vec::new(),
        };

        match body(&mut txn) {
            Ok(value) => {
                let events = txn.events;
                self.state = staged;
                self.events.extend(events);
                Ok(value)
            }
            Err(err) => {
                warn!("{} rolled back: {}", operation, err);
                Err(err)
            }
        }
    }

    // registration

    pub fn register_periodicity(&mut self, periodicity: Periodicity) -> Result<PeriodicityId> {
        periodicity.validate()?;
        let id = periodicity.id;
        self.transact("register_periodicity", |txn| {
            if txn.state.periodicities.contains_key(&id) {
                return Err(LedgerError::validation(format!("periodicity {} already registered", id)));
            }
            txn.state.periodicities.insert(id, periodicity);
            Ok(id)
        })
    }

    /// replace a periodicity definition; loans keep the copy taken at origination
    pub fn update_periodicity(&mut self, id: PeriodicityId, mut periodicity: Periodicity) -> Result<()> {
        periodicity.id = id;
        periodicity.validate()?;
        self.transact("update_periodicity", |txn| {
            txn.state.periodicity(id)?;
            txn.state.periodicities.insert(id, periodicity);
            Ok(())
        })
    }

    pub fn register_creditor(&mut self, name: &str, time: &SafeTimeProvider) -> Result<Creditor> {
        if name.trim().is_empty() {
            return Err(LedgerError::validation("creditor name is required"));
        }
        let creditor = Creditor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: time.now(),
        };
        self.transact("register_creditor", |txn| {
            txn.state.creditors.insert(creditor.id, creditor.clone());
            Ok(creditor)
        })
    }

    /// register an intermediary; `commission_account` receives its commissions
    pub fn register_route(&mut self, name: &str, commission_account: Option<CreditorId>) -> Result<Route> {
        if name.trim().is_empty() {
            return Err(LedgerError::validation("route name is required"));
        }
        let route = Route {
            id: Uuid::new_v4(),
            name: name.to_string(),
            commission_account,
        };
        self.transact("register_route", |txn| {
            if let Some(account) = route.commission_account {
                txn.state.creditor(account)?;
            }
            txn.state.routes.insert(route.id, route.clone());
            Ok(route)
        })
    }

    // cash flow

    /// manual deposit or withdrawal
    pub fn post_entry(
        &mut self,
        creditor_id: CreditorId,
        category: EntryCategory,
        amount: Money,
        description: &str,
        time: &SafeTimeProvider,
    ) -> Result<CashFlowEntry> {
        if !matches!(category, EntryCategory::Deposit | EntryCategory::Withdrawal) {
            return Err(LedgerError::validation(format!(
                "{:?} entries are posted by loan operations",
                category
            )));
        }
        let entry = CashFlowEntry::new(
            creditor_id,
            category.natural_direction(),
            category,
            amount,
            description,
            time.now(),
        );
        self.transact("post_entry", |txn| txn.post(entry))
    }

    pub fn creditor_balance(&self, creditor_id: CreditorId) -> Result<Money> {
        self.state.creditor(creditor_id)?;
        Ok(self.state.journal.balance(creditor_id))
    }

    /// whether the creditor can fund `amount` right now
    pub fn check_available_balance(&self, creditor_id: CreditorId, amount: Money) -> Result<bool> {
        Ok(amount <= self.creditor_balance(creditor_id)?)
    }

    // origination

    /// schedule a request would produce, using the registered periodicity
    pub fn simulate(&self, request: &LoanRequest) -> Result<Simulation> {
        request.validate()?;
        let periodicity = self.state.periodicity(request.periodicity_id)?;
        AmortizationCalculator::new(request.method).simulate_with_periodicity(
            request.principal,
            request.interest_rate,
            request.installment_count,
            periodicity,
            request.first_due_date,
        )
    }

    /// originate a loan with its installments and, if a creditor is attached, its disbursement
    pub fn create_loan(&mut self, request: LoanRequest, time: &SafeTimeProvider) -> Result<Loan> {
        request.validate()?;
        let now = time.now();

        let loan = self.transact("create_loan", |txn| {
            let periodicity = txn.state.periodicity(request.periodicity_id)?.clone();
            if let Some(route_id) = request.route_id {
                txn.state.route(route_id)?;
            }

            let simulation = AmortizationCalculator::new(request.method).simulate_with_periodicity(
                request.principal,
                request.interest_rate,
                request.installment_count,
                &periodicity,
                request.first_due_date,
            )?;
            if let Some(row) = simulation.installments.iter().find(|row| !row.total.is_positive()) {
                return Err(LedgerError::validation(format!(
                    "installment {} of the schedule has nothing to pay",
                    row.number
                )));
            }

            // balance is read before anything is written
            if let Some(creditor_id) = request.creditor_id {
                txn.state.creditor(creditor_id)?;
                let available = txn.state.journal.balance(creditor_id);
                if request.principal > available {
                    warn!(
                        "creditor {} cannot fund {}: balance is {}",
                        creditor_id, request.principal, available
                    );
                    return Err(LedgerError::InsufficientBalance {
                        available,
                        requested: request.principal,
                    });
                }
            }

            let loan = Loan::originate(&request, periodicity, &simulation, now);
            for row in &simulation.installments {
                let installment = Installment::new(loan.id, row.number, row.due_date, row.total);
                txn.state.installments.insert(installment.id, installment);
            }
            txn.state.loans.insert(loan.id, loan.clone());
            txn.events.push(Event::LoanOriginated {
                loan_id: loan.id,
                principal: loan.principal,
                total_amount: loan.total_amount,
                method: loan.method,
                installment_count: loan.installment_count,
                creditor_id: loan.creditor_id,
                timestamp: now,
            });

            if let Some(creditor_id) = loan.creditor_id {
                txn.post(
                    CashFlowEntry::new(
                        creditor_id,
                        EntryDirection::Debit,
                        EntryCategory::LoanDisbursement,
                        loan.principal,
                        format!("disbursement of loan to {}", loan.customer_ref),
                        now,
                    )
                    .for_loan(loan.id),
                )?;
            }

            if request.post_commissions {
                txn.post_commissions(loan.id, now)?;
            }
            Ok(loan)
        })?;

        info!(
            "originated loan {} for {}: {} over {} installments ({:?}), total {}",
            loan.id, loan.customer_ref, loan.principal, loan.installment_count, loan.method, loan.total_amount
        );
        Ok(loan)
    }

    // installment ledger

    pub fn pay_installment(&mut self, request: PaymentRequest) -> Result<Installment> {
        let strategy = self.config.partial_payment;
        let paid = self.transact("pay_installment", |txn| txn.pay(&request, strategy))?;
        debug!(
            "installment {} of loan {} paid {} (fine {}) on {}",
            paid.number, paid.loan_id, paid.paid_amount, paid.fine_amount, request.payment_date
        );
        Ok(paid)
    }

    /// add `delta` to the fine of an unpaid installment
    pub fn apply_fine(
        &mut self,
        installment_id: InstallmentId,
        delta: Money,
        reason: &str,
        time: &SafeTimeProvider,
    ) -> Result<Installment> {
        let now = time.now();
        let updated = self.transact("apply_fine", |txn| {
            let loan_id = txn.state.installment(installment_id)?.loan_id;
            txn.state.loan(loan_id)?.ensure_active()?;

            let installment = txn.state.installment_mut(installment_id)?;
            installment.apply_fine(delta, reason, now)?;
            let updated = installment.clone();

            txn.events.push(Event::FineApplied {
                loan_id,
                installment_id,
                amount: delta,
                new_total: updated.fine_amount,
                reason: reason.to_string(),
                timestamp: now,
            });
            Ok(updated)
        })?;
        debug!(
            "fine of {} on installment {} of loan {} ({}), now {}",
            delta, updated.number, updated.loan_id, reason, updated.fine_amount
        );
        Ok(updated)
    }

    /// undo a payment; a completed loan goes back to active
    pub fn reverse_payment(&mut self, installment_id: InstallmentId, time: &SafeTimeProvider) -> Result<Installment> {
        let now = time.now();
        let reversed = self.transact("reverse_payment", |txn| {
            let installment = txn.state.installment_mut(installment_id)?;
            let reversed_amount = installment.paid_amount;
            installment.reverse()?;
            let reversed = installment.clone();

            let loan = txn.state.loan_mut(reversed.loan_id)?;
            match loan.status {
                LoanStatus::Active => {}
                LoanStatus::Completed => loan.reopen(),
                LoanStatus::Cancelled => {
                    return Err(LedgerError::LoanNotActive { status: loan.status });
                }
            }

            txn.events.push(Event::PaymentReversed {
                loan_id: reversed.loan_id,
                installment_id,
                reversed_amount,
                timestamp: now,
            });
            Ok(reversed)
        })?;
        debug!("payment on installment {} of loan {} reversed", reversed.number, reversed.loan_id);
        Ok(reversed)
    }

    /// pay every open installment at its scheduled amount and complete the loan, all or nothing
    pub fn settle_all(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<Settlement> {
        let now = time.now();
        let payment_date = today(time);

        let settlement = self.transact("settle_all", |txn| {
            txn.state.loan(loan_id)?.ensure_active()?;

            let open: Vec<InstallmentId> = txn
                .state
                .installments_of(loan_id)
                .iter()
                .filter(|i| !i.is_paid())
                .map(|i| i.id)
                .collect();

            let mut amount_paid = Money::ZERO;
            for id in &open {
                let (amount, fine) = {
                    let installment = txn.state.installment(*id)?;
                    (installment.amount, installment.fine_amount)
                };
                let request = PaymentRequest::new(*id, amount, payment_date).with_fine(fine);
                txn.pay(&request, PartialPaymentStrategy::RequireExact)?;
                amount_paid += amount;
            }

            if let Some(unpaid) = txn.state.installments_of(loan_id).iter().find(|i| !i.is_paid()) {
                return Err(LedgerError::consistency(format!(
                    "installment {} of loan {} is still open after settlement",
                    unpaid.number, loan_id
                )));
            }

            let loan = txn.state.loan_mut(loan_id)?;
            loan.complete(now);
            let loan = loan.clone();
            let renewal = loan.renewal_draft()?;
            let installments: Vec<Installment> = txn
                .state
                .installments_of(loan_id)
                .into_iter()
                .cloned()
                .collect();

            txn.events.push(Event::LoanSettled {
                loan_id,
                installments_paid: open.len() as u32,
                amount_paid,
                timestamp: now,
            });
            Ok(Settlement {
                loan,
                installments,
                renewal,
            })
        })?;

        info!(
            "settled loan {}: {} installments now paid",
            loan_id,
            settlement.installments.len()
        );
        Ok(settlement)
    }

    /// add installments after the current last one, due dates from the loan's periodicity
    pub fn append_installments(
        &mut self,
        loan_id: LoanId,
        value: Money,
        count: u32,
        start_date: NaiveDate,
        time: &SafeTimeProvider,
    ) -> Result<Vec<Installment>> {
        if !value.is_positive() {
            return Err(LedgerError::InvalidAmount { amount: value });
        }
        if count == 0 {
            return Err(LedgerError::validation("installment count must be at least 1"));
        }
        let now = time.now();

        let created = self.transact("append_installments", |txn| {
            let loan = txn.state.loan(loan_id)?;
            loan.ensure_active()?;
            let due_dates = generate_due_dates(&loan.periodicity, start_date, count)?;

            let first_number = txn.state.max_installment_number(loan_id) + 1;
            let created: Vec<Installment> = due_dates
                .into_iter()
                .zip(first_number..)
                .map(|(due_date, number)| Installment::new(loan_id, number, due_date, value))
                .collect();
            for installment in &created {
                txn.state.installments.insert(installment.id, installment.clone());
            }

            txn.events.push(Event::InstallmentsAppended {
                loan_id,
                first_number,
                count,
                value,
                timestamp: now,
            });
            Ok(created)
        })?;

        info!("appended {} installments of {} to loan {}", count, value, loan_id);
        Ok(created)
    }

    pub fn renewal_draft(&self, loan_id: LoanId) -> Result<RenewalDraft> {
        self.state.loan(loan_id)?.renewal_draft()
    }

    /// cancel an active loan with nothing paid, offsetting its cash flow
    pub fn cancel_loan(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<Loan> {
        let now = time.now();

        let loan = self.transact("cancel_loan", |txn| {
            txn.state.loan(loan_id)?.ensure_active()?;

            let rows = txn.state.installments_of(loan_id);
            if let Some(paid) = rows.iter().find(|i| i.is_paid()) {
                return Err(LedgerError::validation(format!(
                    "loan {} has paid installment {}; reverse it before cancelling",
                    loan_id, paid.number
                )));
            }
            let ids: Vec<InstallmentId> = rows.iter().map(|i| i.id).collect();
            for id in &ids {
                txn.state.installments.remove(id);
            }

            let creditor_id = txn.state.loan(loan_id)?.creditor_id;
            let mut returned = Money::ZERO;
            if let Some(creditor_id) = creditor_id {
                let journal = &txn.state.journal;
                let outstanding = journal.loan_total(loan_id, EntryCategory::LoanDisbursement)
                    - journal.loan_total(loan_id, EntryCategory::LoanReturn);
                if outstanding.is_positive() {
                    txn.post(
                        CashFlowEntry::new(
                            creditor_id,
                            EntryDirection::Credit,
                            EntryCategory::LoanReturn,
                            outstanding,
                            "return of cancelled loan",
                            now,
                        )
                        .for_loan(loan_id),
                    )?;
                    returned = outstanding;
                }
            }

            let offsets: Vec<CashFlowEntry> = txn
                .state
                .journal
                .entries_for_loan(loan_id)
                .filter(|e| is_commission(e.category) && e.direction == EntryDirection::Credit)
                .map(|e| {
                    CashFlowEntry::new(
                        e.creditor_id,
                        EntryDirection::Debit,
                        e.category,
                        e.amount,
                        format!("reversal: {}", e.description),
                        now,
                    )
                    .for_loan(loan_id)
                })
                .collect();
            for entry in offsets {
                txn.post(entry)?;
            }

            let loan = txn.state.loan_mut(loan_id)?;
            loan.cancel(now);
            let loan = loan.clone();

            txn.events.push(Event::LoanCancelled {
                loan_id,
                installments_removed: ids.len() as u32,
                returned_to_creditor: returned,
                timestamp: now,
            });
            Ok(loan)
        })?;

        info!("cancelled loan {}", loan_id);
        Ok(loan)
    }

    /// money coming back from the borrower to the loan's creditor
    pub fn record_loan_return(
        &mut self,
        loan_id: LoanId,
        amount: Money,
        description: &str,
        time: &SafeTimeProvider,
    ) -> Result<CashFlowEntry> {
        let now = time.now();
        self.transact("record_loan_return", |txn| {
            let creditor_id = txn.state.loan(loan_id)?.creditor_id.ok_or_else(|| {
                LedgerError::validation(format!("loan {} has no creditor attached", loan_id))
            })?;
            txn.post(
                CashFlowEntry::new(
                    creditor_id,
                    EntryDirection::Credit,
                    EntryCategory::LoanReturn,
                    amount,
                    description,
                    now,
                )
                .for_loan(loan_id),
            )
        })
    }

    // commissions

    pub fn commission_split(&self, loan_id: LoanId) -> Result<CommissionSplit> {
        commission_split_for(self.state.loan(loan_id)?, &self.config)
    }

    /// persist the split as ledger entries; once per loan
    pub fn post_commissions(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<CommissionSplit> {
        let now = time.now();
        self.transact("post_commissions", |txn| txn.post_commissions(loan_id, now))
    }

    // reads

    pub fn loan(&self, loan_id: LoanId) -> Result<&Loan> {
        self.state.loan(loan_id)
    }

    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.state.loans.values()
    }

    pub fn installment(&self, installment_id: InstallmentId) -> Result<&Installment> {
        self.state.installment(installment_id)
    }

    pub fn creditor(&self, creditor_id: CreditorId) -> Result<&Creditor> {
        self.state.creditor(creditor_id)
    }

    pub fn route(&self, route_id: RouteId) -> Result<&Route> {
        self.state.route(route_id)
    }

    pub fn periodicity(&self, periodicity_id: PeriodicityId) -> Result<&Periodicity> {
        self.state.periodicity(periodicity_id)
    }

    /// installments of a loan ordered by number
    pub fn installments_of(&self, loan_id: LoanId) -> Result<Vec<&Installment>> {
        self.state.loan(loan_id)?;
        Ok(self.state.installments_of(loan_id))
    }

    /// open installments past their due date, oldest first
    pub fn overdue_installments(&self, time: &SafeTimeProvider) -> Vec<&Installment> {
        let today = today(time);
        let mut overdue: Vec<&Installment> = self
            .state
            .installments
            .values()
            .filter(|i| i.is_overdue(today))
            .collect();
        overdue.sort_by_key(|i| (i.due_date, i.number));
        overdue
    }

    pub fn loan_summary(&self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<LoanSummary> {
        let loan = self.state.loan(loan_id)?;
        let today = today(time);
        let rows = self.state.installments_of(loan_id);

        let paid: Vec<&&Installment> = rows.iter().filter(|i| i.is_paid()).collect();
        let open: Vec<&&Installment> = rows.iter().filter(|i| !i.is_paid()).collect();

        Ok(LoanSummary {
            loan_id,
            status: loan.status,
            installment_count: rows.len() as u32,
            paid_count: paid.len() as u32,
            overdue_count: open.iter().filter(|i| i.is_overdue(today)).count() as u32,
            paid_total: paid.iter().map(|i| i.paid_amount).sum(),
            fines_total: rows.iter().map(|i| i.fine_amount).sum(),
            outstanding: open.iter().map(|i| i.amount_due()).sum(),
            next_due_date: open.iter().map(|i| i.due_date).min(),
        })
    }

    /// fine the configured terms would charge today; not applied
    pub fn suggest_fine(&self, installment_id: InstallmentId, time: &SafeTimeProvider) -> Result<FineAssessment> {
        let installment = self.state.installment(installment_id)?;
        let engine = FineEngine::new(self.config.fine.clone());
        Ok(engine.assess(installment.amount, installment.days_overdue(today(time))))
    }

    pub fn loan_view(&self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<LoanView> {
        let summary = self.loan_summary(loan_id, time)?;
        let loan = self.state.loan(loan_id)?;
        let rows = self.state.installments_of(loan_id);
        Ok(LoanView::new(loan, &rows, summary, today(time)))
    }

    // persistence

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.state)?)
    }

    pub fn from_json_str(json: &str, config: EngineConfig) -> Result<Self> {
        let state: BookState = serde_json::from_str(json)?;
        Self::from_state(state, config)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        debug!("book saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let book = Self::from_json_str(&raw, config)?;
        debug!(
            "book loaded from {}: {} loans",
            path.as_ref().display(),
            book.state.loans.len()
        );
        Ok(book)
    }
}

impl Txn<'_> {
    fn post(&mut self, entry: CashFlowEntry) -> Result<CashFlowEntry> {
        self.state.creditor(entry.creditor_id)?;
        let posted = self.state.journal.append(entry)?.clone();
        let new_balance = self.state.journal.balance(posted.creditor_id);

        debug!(
            "{:?} {:?} of {} for creditor {}, balance {}",
            posted.direction, posted.category, posted.amount, posted.creditor_id, new_balance
        );
        self.events.push(Event::CashFlowPosted {
            creditor_id: posted.creditor_id,
            loan_id: posted.loan_id,
            direction: posted.direction,
            category: posted.category,
            amount: posted.amount,
            new_balance,
        });
        Ok(posted)
    }

    fn pay(&mut self, request: &PaymentRequest, strategy: PartialPaymentStrategy) -> Result<Installment> {
        let loan_id = self.state.installment(request.installment_id)?.loan_id;
        self.state.loan(loan_id)?.ensure_active()?;

        let installment = self.state.installment_mut(request.installment_id)?;
        if let Some(expected) = request.expected_version {
            if installment.version != expected {
                return Err(LedgerError::consistency(format!(
                    "installment {} changed: expected version {}, found {}",
                    installment.id, expected, installment.version
                )));
            }
        }
        if installment.is_paid() {
            return Err(LedgerError::InstallmentAlreadyPaid { id: installment.id });
        }
        strategy.validate(installment.amount, request.amount)?;
        installment.pay(request.amount, request.fine_amount, request.payment_date)?;
        let paid = installment.clone();

        self.events.push(Event::InstallmentPaid {
            loan_id,
            installment_id: paid.id,
            number: paid.number,
            amount: paid.paid_amount,
            fine_amount: paid.fine_amount,
            payment_date: request.payment_date,
        });
        Ok(paid)
    }

    fn post_commissions(&mut self, loan_id: LoanId, now: DateTime<Utc>) -> Result<CommissionSplit> {
        let loan = self.state.loan(loan_id)?.clone();
        if loan.status == LoanStatus::Cancelled {
            return Err(LedgerError::LoanNotActive { status: loan.status });
        }
        if self.state.journal.has_commissions(loan_id) {
            return Err(LedgerError::validation(format!(
                "commissions for loan {} were already posted",
                loan_id
            )));
        }

        let split = commission_split_for(&loan, self.config)?;
        let intermediary_account = match loan.route_id {
            Some(route_id) => self.state.route(route_id)?.commission_account,
            None => None,
        };

        let postings = [
            (loan.creditor_id, EntryCategory::CommissionToCreditor, split.creditor_amount),
            (intermediary_account, EntryCategory::CommissionToIntermediary, split.intermediary_amount),
            (self.config.manager_account, EntryCategory::CommissionToManager, split.manager_amount),
        ];

        let mut posted = [Money::ZERO; 3];
        for (slot, (account, category, amount)) in postings.into_iter().enumerate() {
            let Some(account) = account else { continue };
            if !amount.is_positive() {
                continue;
            }
            self.post(
                CashFlowEntry::new(
                    account,
                    EntryDirection::Credit,
                    category,
                    amount,
                    format!("commission on loan to {}", loan.customer_ref),
                    now,
                )
                .for_loan(loan_id),
            )?;
            posted[slot] = amount;
        }

        self.events.push(Event::CommissionsPosted {
            loan_id,
            creditor: posted[0],
            intermediary: posted[1],
            manager: posted[2],
            timestamp: now,
        });
        Ok(split)
    }
}

fn commission_split_for(loan: &Loan, config: &EngineConfig) -> Result<CommissionSplit> {
    split_commission(
        loan.total_amount,
        loan.interest_rate,
        &loan.commission,
        loan.route_id.is_some(),
        loan.creditor_id.is_some(),
        config.commission_residual,
    )
}

fn is_commission(category: EntryCategory) -> bool {
    matches!(
        category,
        EntryCategory::CommissionToCreditor
            | EntryCategory::CommissionToIntermediary
            | EntryCategory::CommissionToManager
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cashflow::CommissionRates;
    use crate::decimal::Rate;
    use crate::errors::ErrorKind;
    use crate::types::{AmortizationMethod, DisplayStatus, InstallmentStatus};
    use chrono::{Duration, TimeZone};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap()))
    }

    struct Fixture {
        book: LoanBook,
        time: SafeTimeProvider,
        monthly: PeriodicityId,
        creditor: CreditorId,
    }

    fn fixture_with(config: EngineConfig, funding: i64) -> Fixture {
        let time = clock();
        let mut book = LoanBook::new(config).unwrap();
        let monthly = book.register_periodicity(Periodicity::monthly()).unwrap();
        let creditor = book.register_creditor("house capital", &time).unwrap().id;
        if funding > 0 {
            book.post_entry(
                creditor,
                EntryCategory::Deposit,
                Money::from_major(funding),
                "initial funding",
                &time,
            )
            .unwrap();
        }
        book.take_events();
        Fixture {
            book,
            time,
            monthly,
            creditor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(EngineConfig::default(), 10_000)
    }

    fn request(f: &Fixture, principal: i64, method: AmortizationMethod, count: u32) -> LoanRequest {
        LoanRequest::new(
            "customer-7",
            f.monthly,
            Money::from_major(principal),
            method,
            Rate::from_percentage(2),
            count,
            date(2024, 1, 5),
            date(2024, 2, 5),
        )
    }

    /// three installments of exactly 100 each
    fn flat_loan(f: &mut Fixture) -> Loan {
        let req = LoanRequest::new(
            "customer-7",
            f.monthly,
            Money::from_major(300),
            AmortizationMethod::Price,
            Rate::ZERO,
            3,
            date(2024, 1, 5),
            date(2024, 2, 5),
        )
        .with_creditor(f.creditor);
        f.book.create_loan(req, &f.time).unwrap()
    }

    #[test]
    fn test_create_loan_persists_schedule_and_disbursement() {
        let mut f = fixture();
        let req = request(&f, 1_200, AmortizationMethod::Price, 12).with_creditor(f.creditor);
        let loan = f.book.create_loan(req, &f.time).unwrap();

        assert_eq!(loan.installment_value, Money::from_decimal(dec!(113.47)));
        let rows = f.book.installments_of(loan.id).unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].number, 1);
        assert_eq!(rows[0].due_date, date(2024, 2, 5));
        assert_eq!(rows[11].due_date, date(2025, 1, 5));
        let scheduled: Money = rows.iter().map(|i| i.amount).sum();
        assert_eq!(scheduled, loan.total_amount);

        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(8_800));
        assert_eq!(
            f.book.journal().loan_total(loan.id, EntryCategory::LoanDisbursement),
            Money::from_major(1_200)
        );

        let events = f.book.take_events();
        assert!(matches!(events[0], Event::LoanOriginated { .. }));
        assert!(matches!(events[1], Event::CashFlowPosted { direction: EntryDirection::Debit, .. }));
    }

    #[test]
    fn test_insufficient_balance_blocks_creation_before_any_write() {
        let mut f = fixture_with(EngineConfig::default(), 500);
        let req = request(&f, 600, AmortizationMethod::Price, 6).with_creditor(f.creditor);

        assert!(!f.book.check_available_balance(f.creditor, Money::from_major(600)).unwrap());
        let err = f.book.create_loan(req, &f.time).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        assert_eq!(f.book.loans().count(), 0);
        assert!(f.book.state().installments.is_empty());
        assert_eq!(f.book.journal().len(), 1);
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(500));
        assert!(f.book.take_events().is_empty());
    }

    #[test]
    fn test_commission_rejection_rolls_back_staged_origination() {
        let mut f = fixture_with(EngineConfig::strict(), 10_000);
        let route = f.book.register_route("broker", None).unwrap().id;
        f.book.take_events();
        let journal_len = f.book.journal().len();

        // 1.5% + 1% exceeds the 2% loan rate, rejected after installments and disbursement are staged
        let req = request(&f, 1_000, AmortizationMethod::Price, 4)
            .with_creditor(f.creditor)
            .with_route(route)
            .with_commission(CommissionRates::new(Some(dec!(1.5)), Some(dec!(1))))
            .posting_commissions();
        let err = f.book.create_loan(req, &f.time).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(f.book.loans().count(), 0);
        assert!(f.book.state().installments.is_empty());
        assert_eq!(f.book.journal().len(), journal_len);
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(10_000));
        assert!(f.book.take_events().is_empty());
    }

    #[test]
    fn test_loan_without_creditor_skips_cash_flow() {
        let mut f = fixture();
        let loan = f
            .book
            .create_loan(request(&f, 1_000, AmortizationMethod::Sac, 4), &f.time)
            .unwrap();
        assert!(f.book.journal().entries_for_loan(loan.id).next().is_none());
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(10_000));
    }

    #[test]
    fn test_unknown_references_are_rejected() {
        let mut f = fixture();
        let req = request(&f, 100, AmortizationMethod::Price, 2).with_route(Uuid::new_v4());
        assert_eq!(f.book.create_loan(req, &f.time).unwrap_err().kind(), ErrorKind::NotFound);

        let mut req = request(&f, 100, AmortizationMethod::Price, 2);
        req.periodicity_id = Uuid::new_v4();
        assert!(matches!(
            f.book.create_loan(req, &f.time),
            Err(LedgerError::PeriodicityNotFound { .. })
        ));
        assert_eq!(f.book.loans().count(), 0);
    }

    #[test]
    fn test_zero_value_installments_are_rejected() {
        let mut f = fixture();
        let mut req = request(&f, 100, AmortizationMethod::InterestOnly, 3);
        req.interest_rate = Rate::ZERO;
        assert!(f.book.create_loan(req, &f.time).is_err());
        assert!(f.book.state().installments.is_empty());
    }

    #[test]
    fn test_pay_then_reverse_restores_pending_and_keeps_fine() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let first = f.book.installments_of(loan.id).unwrap()[0].id;

        f.book.apply_fine(first, Money::from_major(2), "late", &f.time).unwrap();
        let paid = f
            .book
            .pay_installment(
                PaymentRequest::new(first, Money::from_major(100), date(2024, 2, 9))
                    .with_fine(Money::from_major(3)),
            )
            .unwrap();
        assert_eq!(paid.status, InstallmentStatus::Paid);
        assert_eq!(paid.paid_at, Some(date(2024, 2, 9)));

        let reversed = f.book.reverse_payment(first, &f.time).unwrap();
        assert_eq!(reversed.status, InstallmentStatus::Pending);
        assert_eq!(reversed.paid_amount, Money::ZERO);
        assert_eq!(reversed.paid_at, None);
        assert_eq!(reversed.fine_amount, Money::from_major(3));
    }

    #[test]
    fn test_double_pay_fails_cleanly() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let first = f.book.installments_of(loan.id).unwrap()[0].id;

        let payment = PaymentRequest::new(first, Money::from_major(100), date(2024, 2, 5));
        f.book.pay_installment(payment.clone()).unwrap();
        f.book.take_events();

        let err = f.book.pay_installment(payment).unwrap_err();
        assert!(matches!(err, LedgerError::InstallmentAlreadyPaid { .. }));
        assert_eq!(f.book.installment(first).unwrap().paid_amount, Money::from_major(100));
        assert!(f.book.take_events().is_empty());
    }

    #[test]
    fn test_stale_version_is_a_consistency_error() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let first = f.book.installments_of(loan.id).unwrap()[0].clone();

        f.book.apply_fine(first.id, Money::ONE, "late", &f.time).unwrap();
        let err = f
            .book
            .pay_installment(
                PaymentRequest::new(first.id, Money::from_major(100), date(2024, 2, 5))
                    .with_fine(Money::ONE)
                    .expecting_version(first.version),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }

    #[test]
    fn test_partial_payment_strategies() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let ids: Vec<InstallmentId> = f.book.installments_of(loan.id).unwrap().iter().map(|i| i.id).collect();

        // default accepts partial and over payments as recorded figures
        f.book
            .pay_installment(PaymentRequest::new(ids[0], Money::from_major(60), date(2024, 2, 5)))
            .unwrap();
        f.book
            .pay_installment(PaymentRequest::new(ids[1], Money::from_major(140), date(2024, 3, 5)))
            .unwrap();

        let mut strict = fixture_with(EngineConfig::strict(), 10_000);
        let loan = flat_loan(&mut strict);
        let id = strict.book.installments_of(loan.id).unwrap()[0].id;
        let err = strict
            .book
            .pay_installment(PaymentRequest::new(id, Money::from_major(60), date(2024, 2, 5)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::PaymentMismatch { .. }));
        strict
            .book
            .pay_installment(PaymentRequest::new(id, Money::from_major(100), date(2024, 2, 5)))
            .unwrap();
    }

    #[test]
    fn test_fines_accumulate_and_suggestion_follows_config() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let first = f.book.installments_of(loan.id).unwrap()[0].id;

        // due 2024-02-05, ten days late
        f.time.test_control().unwrap().advance(Duration::days(41));
        let suggestion = f.book.suggest_fine(first, &f.time).unwrap();
        assert_eq!(suggestion.days_charged, 10);
        assert_eq!(suggestion.late_fee, Money::from_major(2));
        assert_eq!(suggestion.late_interest, Money::from_decimal(dec!(0.33)));

        f.book.apply_fine(first, suggestion.fine_amount, "late fee and interest", &f.time).unwrap();
        let updated = f.book.apply_fine(first, Money::ONE, "collection call", &f.time).unwrap();
        assert_eq!(updated.fine_amount, Money::from_decimal(dec!(3.33)));
        assert_eq!(updated.fine_history.len(), 2);
        assert_eq!(updated.status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_overdue_is_read_time_view() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);

        assert!(f.book.overdue_installments(&f.time).is_empty());

        f.time.test_control().unwrap().advance(Duration::days(61));
        let overdue = f.book.overdue_installments(&f.time);
        assert_eq!(overdue.len(), 2);
        assert_eq!(overdue[0].due_date, date(2024, 2, 5));

        let summary = f.book.loan_summary(loan.id, &f.time).unwrap();
        assert_eq!(summary.overdue_count, 2);
        assert_eq!(summary.outstanding, Money::from_major(300));
        assert_eq!(summary.next_due_date, Some(date(2024, 2, 5)));

        let view = f.book.loan_view(loan.id, &f.time).unwrap();
        assert_eq!(view.installments[0].display_status, DisplayStatus::Overdue);
        assert_eq!(view.installments[2].display_status, DisplayStatus::Pending);
    }

    #[test]
    fn test_settle_all_pays_everything_and_completes() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        f.book.take_events();

        let settlement = f.book.settle_all(loan.id, &f.time).unwrap();
        assert_eq!(settlement.loan.status, LoanStatus::Completed);
        assert_eq!(settlement.installments.len(), 3);
        for installment in &settlement.installments {
            assert_eq!(installment.status, InstallmentStatus::Paid);
            assert_eq!(installment.paid_amount, Money::from_major(100));
            assert_eq!(installment.paid_at, Some(date(2024, 1, 5)));
        }
        assert_eq!(settlement.renewal.principal, Money::from_major(300));
        assert_eq!(f.book.loan(loan.id).unwrap().status, LoanStatus::Completed);

        let events = f.book.take_events();
        assert_eq!(events.iter().filter(|e| matches!(e, Event::InstallmentPaid { .. })).count(), 3);
        assert!(matches!(events.last(), Some(Event::LoanSettled { installments_paid: 3, .. })));
    }

    #[test]
    fn test_settle_all_keeps_current_fine_and_skips_paid() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let ids: Vec<InstallmentId> = f.book.installments_of(loan.id).unwrap().iter().map(|i| i.id).collect();

        f.book
            .pay_installment(PaymentRequest::new(ids[0], Money::from_major(90), date(2024, 2, 5)))
            .unwrap();
        f.book.apply_fine(ids[2], Money::from_major(7), "late", &f.time).unwrap();

        let settlement = f.book.settle_all(loan.id, &f.time).unwrap();
        assert_eq!(settlement.installments[0].paid_amount, Money::from_major(90));
        assert_eq!(settlement.installments[2].fine_amount, Money::from_major(7));
        assert!(matches!(
            f.book.take_events().last(),
            Some(Event::LoanSettled { installments_paid: 2, .. })
        ));
    }

    #[test]
    fn test_failed_operation_leaves_state_untouched() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let before = f.book.to_json().unwrap();

        f.book.settle_all(loan.id, &f.time).unwrap();
        // a second settlement hits a completed loan and must not change anything
        let settled = f.book.to_json().unwrap();
        assert!(f.book.settle_all(loan.id, &f.time).is_err());
        assert_eq!(f.book.to_json().unwrap(), settled);
        assert_ne!(before, settled);

        assert!(f.book.cancel_loan(loan.id, &f.time).is_err());
        assert_eq!(f.book.to_json().unwrap(), settled);
    }

    #[test]
    fn test_reversal_reopens_completed_loan() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let settlement = f.book.settle_all(loan.id, &f.time).unwrap();

        f.book.reverse_payment(settlement.installments[1].id, &f.time).unwrap();
        let reopened = f.book.loan(loan.id).unwrap();
        assert_eq!(reopened.status, LoanStatus::Active);
        assert!(reopened.completed_at.is_none());
        assert!(f.book.renewal_draft(loan.id).is_err());
    }

    #[test]
    fn test_append_continues_numbering_without_touching_totals() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);

        let created = f
            .book
            .append_installments(loan.id, Money::from_major(50), 2, date(2024, 5, 31), &f.time)
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].number, 4);
        assert_eq!(created[1].number, 5);
        assert_eq!(created[0].due_date, date(2024, 5, 31));
        assert_eq!(created[1].due_date, date(2024, 6, 30));

        let stored = f.book.loan(loan.id).unwrap();
        assert_eq!(stored.total_amount, loan.total_amount);
        assert_eq!(stored.installment_count, 3);
        assert_eq!(f.book.installments_of(loan.id).unwrap().len(), 5);

        assert!(f
            .book
            .append_installments(loan.id, Money::ZERO, 1, date(2024, 7, 31), &f.time)
            .is_err());
    }

    #[test]
    fn test_loan_keeps_its_periodicity_copy() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);

        f.book.update_periodicity(f.monthly, Periodicity::weekly()).unwrap();
        assert_eq!(f.book.periodicity(f.monthly).unwrap().id, f.monthly);

        let created = f
            .book
            .append_installments(loan.id, Money::from_major(10), 2, date(2024, 5, 5), &f.time)
            .unwrap();
        assert_eq!(created[1].due_date, date(2024, 6, 5));
    }

    #[test]
    fn test_cancel_cascades_and_returns_disbursement() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(9_700));

        let cancelled = f.book.cancel_loan(loan.id, &f.time).unwrap();
        assert_eq!(cancelled.status, LoanStatus::Cancelled);
        assert!(f.book.installments_of(loan.id).unwrap().is_empty());
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(10_000));
        // the disbursement line is still there, offset by a return
        assert_eq!(f.book.journal().entries_for_loan(loan.id).count(), 2);
    }

    #[test]
    fn test_cancel_rejected_once_something_is_paid() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let first = f.book.installments_of(loan.id).unwrap()[0].id;
        f.book
            .pay_installment(PaymentRequest::new(first, Money::from_major(100), date(2024, 2, 5)))
            .unwrap();

        assert!(f.book.cancel_loan(loan.id, &f.time).is_err());
        assert_eq!(f.book.installments_of(loan.id).unwrap().len(), 3);
    }

    #[test]
    fn test_commission_posting() {
        let mut f = fixture();
        let broker = f.book.register_creditor("broker account", &f.time).unwrap().id;
        let manager = f.book.register_creditor("manager account", &f.time).unwrap().id;
        let route = f.book.register_route("broker", Some(broker)).unwrap().id;
        f.book = LoanBook::from_state(
            f.book.state().clone(),
            EngineConfig::default().with_manager_account(manager),
        )
        .unwrap();

        let mut req = request(&f, 1_000, AmortizationMethod::SimpleInterest, 5)
            .with_creditor(f.creditor)
            .with_route(route)
            .with_commission(CommissionRates::new(Some(dec!(1)), Some(dec!(0.5))));
        req.interest_rate = Rate::from_percentage(4);
        let loan = f.book.create_loan(req, &f.time).unwrap();
        // 1000 + 4% x 5
        assert_eq!(loan.total_amount, Money::from_major(1_200));

        let split = f.book.commission_split(loan.id).unwrap();
        assert_eq!(split.intermediary_amount, Money::from_major(12));
        assert_eq!(split.creditor_amount, Money::from_major(6));
        assert_eq!(split.manager_amount, Money::from_major(30));

        f.book.post_commissions(loan.id, &f.time).unwrap();
        assert_eq!(f.book.creditor_balance(broker).unwrap(), Money::from_major(12));
        assert_eq!(f.book.creditor_balance(manager).unwrap(), Money::from_major(30));
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(9_006));

        assert!(f.book.post_commissions(loan.id, &f.time).is_err());

        // cancelling offsets the commissions as well as the disbursement
        f.book.cancel_loan(loan.id, &f.time).unwrap();
        assert_eq!(f.book.creditor_balance(broker).unwrap(), Money::ZERO);
        assert_eq!(f.book.creditor_balance(manager).unwrap(), Money::ZERO);
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), Money::from_major(10_000));
    }

    #[test]
    fn test_manual_entries_and_balance_invariant() {
        let mut f = fixture();
        f.book
            .post_entry(f.creditor, EntryCategory::Withdrawal, Money::from_major(2_500), "payout", &f.time)
            .unwrap();
        let loan = flat_loan(&mut f);
        f.book
            .record_loan_return(loan.id, Money::from_major(100), "first return", &f.time)
            .unwrap();

        let journal = f.book.journal();
        let credits = journal.total(f.creditor, EntryDirection::Credit);
        let debits = journal.total(f.creditor, EntryDirection::Debit);
        assert_eq!(f.book.creditor_balance(f.creditor).unwrap(), credits - debits);
        assert_eq!(credits - debits, Money::from_major(7_300));

        assert!(f
            .book
            .post_entry(f.creditor, EntryCategory::LoanReturn, Money::ONE, "not manual", &f.time)
            .is_err());
        assert!(f
            .book
            .post_entry(f.creditor, EntryCategory::Deposit, Money::ZERO, "nothing", &f.time)
            .is_err());
    }

    #[test]
    fn test_renewal_draft_roundtrip() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        assert!(f.book.renewal_draft(loan.id).is_err());

        let settlement = f.book.settle_all(loan.id, &f.time).unwrap();
        let next = settlement
            .renewal
            .into_request(date(2024, 6, 1), date(2024, 7, 1));
        let renewed = f.book.create_loan(next, &f.time).unwrap();
        assert_eq!(renewed.principal, loan.principal);
        assert_eq!(renewed.creditor_id, Some(f.creditor));
        assert_ne!(renewed.id, loan.id);
    }

    #[test]
    fn test_json_persistence_roundtrip() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let first = f.book.installments_of(loan.id).unwrap()[0].id;
        f.book.apply_fine(first, Money::from_major(2), "late", &f.time).unwrap();

        let path = std::env::temp_dir().join(format!("loan-book-{}.json", Uuid::new_v4()));
        f.book.save_json(&path).unwrap();
        let restored = LoanBook::load_json(&path, EngineConfig::default()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(restored.loan(loan.id).unwrap(), f.book.loan(loan.id).unwrap());
        assert_eq!(restored.installment(first).unwrap().fine_amount, Money::from_major(2));
        assert_eq!(
            restored.creditor_balance(f.creditor).unwrap(),
            f.book.creditor_balance(f.creditor).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_dangling_references() {
        let mut f = fixture();
        let loan = flat_loan(&mut f);
        let mut state = f.book.state().clone();
        state.loans.remove(&loan.id);

        let err = LoanBook::from_state(state, EngineConfig::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }
}
