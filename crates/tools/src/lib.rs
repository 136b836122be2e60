//! Financial domain tools for Hearthmind.
//!
//! Budget analysis, portfolio review, goal planning, and debt payoff
//! optimization. All computation is deterministic arithmetic over the
//! caller's inputs; persistence and cross-domain behavior come from the
//! dispatch pipeline these tools run inside.

pub mod budget;
pub mod debt;
pub mod goal;
pub mod portfolio;

use hearthmind_core::tool::Tool;

pub use budget::AnalyzeBudgetTool;
pub use debt::OptimizeDebtPayoffTool;
pub use goal::PlanFinancialGoalTool;
pub use portfolio::AnalyzePortfolioTool;

/// All financial domain tools, ready to register on a server.
pub fn financial_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(AnalyzeBudgetTool),
        Box::new(AnalyzePortfolioTool),
        Box::new(PlanFinancialGoalTool),
        Box::new(OptimizeDebtPayoffTool),
    ]
}
