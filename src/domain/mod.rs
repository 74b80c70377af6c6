pub mod demand;
pub mod distribution;
pub mod ids;
pub mod project;
pub mod project_consolidation;
pub mod replenishing_consolidation;
pub mod stage;
pub mod team_consolidation;
pub mod throughput;
