use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ExpenseId = Uuid;

/// A shop running cost (rent, utilities, supplies). Expenses have no
/// recycle-bin lifecycle: they are plain journal entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        description: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount,
            category: category.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Default)]
pub struct ExpenseLedger {
    expenses: Vec<Expense>,
}

impl ExpenseLedger {
    pub fn from_records(expenses: Vec<Expense>) -> Self {
        Self { expenses }
    }

    pub fn into_records(self) -> Vec<Expense> {
        self.expenses
    }

    pub fn records(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn add(&mut self, expense: Expense) -> &Expense {
        self.expenses.push(expense);
        self.expenses.last().unwrap()
    }

    pub fn total(&self) -> f64 {
        self.expenses.iter().map(|e| e.amount).sum()
    }
}
