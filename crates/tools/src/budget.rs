//! Budget analysis — income vs. expenses, savings rate, and health scoring.

use async_trait::async_trait;
use chrono::Utc;
use hearthmind_core::error::ToolError;
use hearthmind_core::tool::Tool;

pub struct AnalyzeBudgetTool;

#[async_trait]
impl Tool for AnalyzeBudgetTool {
    fn name(&self) -> &str {
        "analyze_budget"
    }

    fn description(&self) -> &str {
        "Analyze budget data and provide insights"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "income": { "type": "number", "description": "Monthly income" },
                "expenses": {
                    "type": "object",
                    "description": "Expense categories with amounts",
                    "additionalProperties": { "type": "number" }
                },
                "goals": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Financial goals"
                }
            },
            "required": ["income", "expenses"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let income = arguments
            .get("income")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'income' argument".into()))?;
        let expenses = arguments
            .get("expenses")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expenses' argument".into()))?;
        let goals: Vec<String> = arguments
            .get("goals")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|g| g.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let total_expenses: f64 = expenses.values().filter_map(|v| v.as_f64()).sum();
        let net_income = income - total_expenses;
        let savings_rate = if income > 0.0 {
            (net_income / income) * 100.0
        } else {
            0.0
        };

        let mut spending_analysis = serde_json::Map::new();
        for (category, amount) in expenses {
            let amount = amount.as_f64().unwrap_or(0.0);
            let percentage = if income > 0.0 {
                (amount / income) * 100.0
            } else {
                0.0
            };
            spending_analysis.insert(
                category.clone(),
                serde_json::json!({
                    "amount": amount,
                    "percentage_of_income": round2(percentage),
                }),
            );
        }

        let health_score = (savings_rate * 2.0).clamp(0.0, 100.0);

        let mut recommendations: Vec<String> = Vec::new();
        if savings_rate < 10.0 {
            recommendations
                .push("Consider increasing savings rate to at least 10% of income".into());
        }
        if savings_rate < 0.0 {
            recommendations.push(
                "URGENT: Expenses exceed income - review and cut costs immediately".into(),
            );
        }
        for (category, analysis) in &spending_analysis {
            let pct = analysis["percentage_of_income"].as_f64().unwrap_or(0.0);
            let housing = matches!(category.to_lowercase().as_str(), "housing" | "rent");
            if pct > 30.0 && !housing {
                recommendations.push(format!(
                    "Consider reducing {category} spending (currently {pct:.1}% of income)"
                ));
            }
        }

        Ok(serde_json::json!({
            "budget_summary": {
                "monthly_income": income,
                "total_expenses": total_expenses,
                "net_income": net_income,
                "savings_rate": round2(savings_rate),
            },
            "spending_analysis": spending_analysis,
            "health_score": round1(health_score),
            "recommendations": recommendations,
            "goals_assessment": assess_goals(net_income, &goals),
            "analysis_date": Utc::now().to_rfc3339(),
        }))
    }
}

fn assess_goals(net_income: f64, _goals: &[String]) -> serde_json::Value {
    if net_income <= 0.0 {
        return serde_json::json!({
            "feasible": false,
            "reason": "No surplus income available for goals",
        });
    }

    serde_json::json!({
        "surplus_available": net_income,
        "feasible": true,
        "recommended_allocation": {
            "emergency_fund": round2(net_income * 0.3),
            "retirement": round2(net_income * 0.4),
            "other_goals": round2(net_income * 0.3),
        },
    })
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
