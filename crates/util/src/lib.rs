pub mod definition_info_store;
pub mod history_store;
pub mod path_processing;
pub mod variable_rows;

pub use definition_info_store::{DefinitionInfoStore, InMemoryDefinitionInfoStore, InfoStoreError, JsonDefinitionInfoStore};
pub use history_store::{
    HistoricVariableQuery, HistoricVariableStore, HistoryStoreError, InMemoryHistoricVariableStore, JsonHistoricVariableStore,
};
pub use path_processing::{default_config_dir, expand_tilde};
pub use variable_rows::{InMemoryVariableRowStore, RowStoreError, VariableRowStore};
