pub mod gateway;
pub mod instructor;

pub use gateway::GatewayClient;
pub use instructor::InstructorClient;
