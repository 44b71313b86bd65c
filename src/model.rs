pub mod api_model;
pub mod db_model;
pub mod stop;
pub mod transit_api_model;
