pub mod consolidation_config;
pub mod consolidation_job;
pub mod consolidation_reader;
pub mod consolidation_store;
pub mod consolidation_store_yaml;
pub mod demand_queries;
pub mod flow_data_yaml;
pub mod flow_repository;
pub mod project_consolidation_job;
pub mod replenishing_consolidation_job;
pub mod statistics_service;
pub mod team_consolidation_job;
pub mod throughput_forecast;
pub mod throughput_yaml;
pub mod time_service;
pub mod work_item_flow;
