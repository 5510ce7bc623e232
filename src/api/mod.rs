mod handlers;
pub mod instrument;
mod request_id;
mod routes;
pub mod writer;

pub use handlers::{Greeter, GreetingResponse};
pub use instrument::{Instrumented, WriterHandler};
pub use routes::*;
pub use writer::{ResponseBuffer, ResponseWriter, StatusRecorder};
