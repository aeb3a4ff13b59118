pub mod europe_pmc;
pub mod pubmed;
pub mod scholar;
