pub mod analysis_run;
pub mod categorizer_service;
pub mod checklist_aggregator;
pub mod document_service;
pub mod path_classifier;
pub mod path_resolver;
pub mod prompt_templates;
pub mod reconciliation_service;
pub mod record_normalizer;
pub mod report_service;
pub mod storage_service;
pub mod tracker_service;
