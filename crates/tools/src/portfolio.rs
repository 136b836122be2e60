//! Portfolio analysis — valuation, diversification, and risk fit.

use crate::budget::round2;
use async_trait::async_trait;
use chrono::Utc;
use hearthmind_core::error::ToolError;
use hearthmind_core::tool::Tool;

pub struct AnalyzePortfolioTool;

#[async_trait]
impl Tool for AnalyzePortfolioTool {
    fn name(&self) -> &str {
        "analyze_portfolio"
    }

    fn description(&self) -> &str {
        "Analyze investment portfolio and provide recommendations"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "holdings": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "symbol": { "type": "string" },
                            "quantity": { "type": "number" },
                            "cost_basis": { "type": "number" }
                        }
                    }
                },
                "risk_tolerance": {
                    "type": "string",
                    "enum": ["conservative", "moderate", "aggressive"]
                },
                "time_horizon": {
                    "type": "integer",
                    "description": "Investment timeline in years"
                }
            },
            "required": ["holdings"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let holdings = arguments
            .get("holdings")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'holdings' argument".into()))?;
        let risk_tolerance = arguments
            .get("risk_tolerance")
            .and_then(|v| v.as_str())
            .unwrap_or("moderate");
        let time_horizon = arguments
            .get("time_horizon")
            .and_then(|v| v.as_i64())
            .unwrap_or(10);

        let total_value: f64 = holdings
            .iter()
            .map(|h| {
                let quantity = h.get("quantity").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let cost_basis = h.get("cost_basis").and_then(|v| v.as_f64()).unwrap_or(0.0);
                quantity * cost_basis
            })
            .sum();

        let diversification_score = ((holdings.len() * 10) as f64).min(100.0);

        let mut recommendations: Vec<String> = vec![
            "Consider regular portfolio rebalancing".into(),
            "Ensure adequate diversification across sectors and asset classes".into(),
        ];
        if holdings.len() < 5 {
            recommendations.push("Consider adding more holdings for better diversification".into());
        }
        if risk_tolerance == "conservative" && time_horizon > 15 {
            recommendations
                .push("With longer time horizon, consider moderate risk tolerance".into());
        }

        Ok(serde_json::json!({
            "portfolio_analysis": {
                "total_holdings": holdings.len(),
                "estimated_value": round2(total_value),
                "diversification_score": diversification_score,
                "risk_assessment": risk_tolerance,
            },
            "recommendations": recommendations,
            "risk_tolerance": risk_tolerance,
            "time_horizon_years": time_horizon,
            "analysis_date": Utc::now().to_rfc3339(),
        }))
    }
}
