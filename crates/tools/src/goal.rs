//! Financial goal planning — required savings rate and feasibility.

use crate::budget::round2;
use async_trait::async_trait;
use hearthmind_core::error::ToolError;
use hearthmind_core::tool::Tool;

pub struct PlanFinancialGoalTool;

#[async_trait]
impl Tool for PlanFinancialGoalTool {
    fn name(&self) -> &str {
        "plan_financial_goal"
    }

    fn description(&self) -> &str {
        "Create a plan to achieve specific financial goals"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "goal_type": {
                    "type": "string",
                    "enum": ["retirement", "house", "vacation", "emergency_fund", "education", "other"]
                },
                "target_amount": { "type": "number", "description": "Target amount needed" },
                "current_savings": { "type": "number", "description": "Current amount saved" },
                "timeline_months": { "type": "integer", "description": "Timeline in months" },
                "monthly_contribution": {
                    "type": "number",
                    "description": "Monthly contribution ability"
                }
            },
            "required": ["goal_type", "target_amount", "timeline_months"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let goal_type = arguments
            .get("goal_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'goal_type' argument".into()))?;
        let target_amount = arguments
            .get("target_amount")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing 'target_amount' argument".into())
            })?;
        let timeline_months = arguments
            .get("timeline_months")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing 'timeline_months' argument".into())
            })?;
        let current_savings = arguments
            .get("current_savings")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let monthly_contribution = arguments
            .get("monthly_contribution")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        let remaining_amount = target_amount - current_savings;
        let required_monthly_savings = if timeline_months > 0 {
            remaining_amount / timeline_months as f64
        } else {
            0.0
        };

        let achievable = monthly_contribution >= required_monthly_savings;
        let shortfall = (required_monthly_savings - monthly_contribution).max(0.0);

        let mut recommendations: Vec<String> = Vec::new();
        if achievable {
            recommendations.push("Goal is achievable with current contribution plan!".into());
        } else {
            recommendations.push(format!(
                "Increase monthly savings by ${shortfall:.2} to meet goal"
            ));
            if monthly_contribution > 0.0 {
                let extra_months =
                    (remaining_amount / monthly_contribution) as i64 - timeline_months;
                recommendations.push(format!("Or extend timeline by {extra_months} months"));
            }
        }
        match goal_type {
            "emergency_fund" => recommendations
                .push("Aim for 3-6 months of expenses for emergency fund".into()),
            "retirement" => recommendations
                .push("Consider maximizing employer 401(k) matching first".into()),
            _ => {}
        }

        Ok(serde_json::json!({
            "goal_details": {
                "type": goal_type,
                "target_amount": target_amount,
                "current_savings": current_savings,
                "amount_needed": remaining_amount,
                "timeline_months": timeline_months,
            },
            "savings_plan": {
                "required_monthly_savings": round2(required_monthly_savings),
                "current_monthly_contribution": monthly_contribution,
                "is_achievable": achievable,
                "monthly_shortfall": round2(shortfall),
            },
            "recommendations": recommendations,
        }))
    }
}
