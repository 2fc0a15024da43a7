/// Publication identifier in epodoc form: country + number + kind code.
/// Example: `EP1000000.A1`
pub type DocumentId = String;
/// Main (coarse) IPC classification symbol.
/// Examples: `A61K`, `G06F`
pub type MainClass = String;
/// Sub (fine) IPC classification symbol, paired with a main class.
/// Examples: `38/44`, `9/00`
pub type SubClass = String;
/// Label identifying a sampling stratum in filenames and logs.
/// Examples: `A61K`, `random_sample`
pub type ScopeLabel = String;
/// CQL query string sent to the published-data search endpoint.
/// Example: `ipc=A61K and pn=EP and pd="20030101 20031231"`
pub type CqlQuery = String;
/// Calendar year used to bucket samples and reports.
/// Examples: `1970`, `2021`
pub type Year = i32;
