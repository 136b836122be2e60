//! Debt payoff optimization — avalanche, snowball, and hybrid ordering.

use crate::budget::{round1, round2};
use async_trait::async_trait;
use chrono::Utc;
use hearthmind_core::error::ToolError;
use hearthmind_core::tool::Tool;

pub struct OptimizeDebtPayoffTool;

#[derive(Debug, Clone)]
struct Debt {
    name: String,
    balance: f64,
    interest_rate: f64,
    minimum_payment: f64,
}

#[async_trait]
impl Tool for OptimizeDebtPayoffTool {
    fn name(&self) -> &str {
        "optimize_debt_payoff"
    }

    fn description(&self) -> &str {
        "Optimize debt payoff strategy"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "debts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "balance": { "type": "number" },
                            "interest_rate": { "type": "number" },
                            "minimum_payment": { "type": "number" }
                        }
                    }
                },
                "extra_payment": {
                    "type": "number",
                    "description": "Extra monthly amount for debt payoff"
                },
                "strategy": {
                    "type": "string",
                    "enum": ["avalanche", "snowball", "hybrid"],
                    "default": "avalanche"
                }
            },
            "required": ["debts"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let raw_debts = arguments
            .get("debts")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'debts' argument".into()))?;
        if raw_debts.is_empty() {
            return Err(ToolError::InvalidArguments(
                "At least one debt is required".into(),
            ));
        }
        let extra_payment = arguments
            .get("extra_payment")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let strategy = arguments
            .get("strategy")
            .and_then(|v| v.as_str())
            .unwrap_or("avalanche");

        let mut debts: Vec<Debt> = raw_debts
            .iter()
            .map(|d| Debt {
                name: d
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unnamed")
                    .to_string(),
                balance: d.get("balance").and_then(|v| v.as_f64()).unwrap_or(0.0),
                interest_rate: d
                    .get("interest_rate")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
                minimum_payment: d
                    .get("minimum_payment")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
            })
            .collect();

        let total_debt: f64 = debts.iter().map(|d| d.balance).sum();
        let total_minimum: f64 = debts.iter().map(|d| d.minimum_payment).sum();

        match strategy {
            "snowball" => debts.sort_by(|a, b| {
                a.balance
                    .partial_cmp(&b.balance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            "hybrid" => {
                // Highest interest first, but small balances (< $1000) jump
                // the queue for quick wins.
                debts.sort_by(|a, b| {
                    hybrid_key(a)
                        .partial_cmp(&hybrid_key(b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
            }
            _ => debts.sort_by(|a, b| {
                b.interest_rate
                    .partial_cmp(&a.interest_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        }

        let payoff_plan: Vec<serde_json::Value> = debts
            .iter()
            .enumerate()
            .map(|(i, debt)| {
                let mut priority_payment = debt.minimum_payment;
                if i == 0 {
                    priority_payment += extra_payment;
                }
                let months = if priority_payment > 0.0 {
                    serde_json::json!(round1(debt.balance / priority_payment))
                } else {
                    serde_json::Value::Null
                };
                serde_json::json!({
                    "debt_name": debt.name,
                    "balance": debt.balance,
                    "interest_rate": debt.interest_rate,
                    "priority_payment": round2(priority_payment),
                    "estimated_payoff_months": months,
                })
            })
            .collect();

        Ok(serde_json::json!({
            "debt_summary": {
                "total_debt": total_debt,
                "total_minimum_payments": total_minimum,
                "extra_payment_available": extra_payment,
                "strategy_used": strategy,
            },
            "payoff_plan": payoff_plan,
            "recommendations": [
                format!("Focus extra payments on {} first", debts[0].name),
                "Continue minimum payments on all other debts",
                "Consider debt consolidation if rates can be improved",
            ],
            "analysis_date": Utc::now().to_rfc3339(),
        }))
    }
}

fn hybrid_key(debt: &Debt) -> f64 {
    if debt.balance < 1000.0 {
        -debt.balance
    } else {
        -debt.interest_rate
    }
}
