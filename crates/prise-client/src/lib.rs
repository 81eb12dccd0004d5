pub mod errors;
pub mod input;
pub mod layout;
pub mod render;
pub mod rpc_client;
pub mod session_file;
pub mod surface;

pub use errors::ClientError;
pub use input::{InputRouter, RouterAction};
pub use render::Renderer;
pub use rpc_client::RpcClient;
pub use session_file::SessionDocument;
pub use surface::SurfaceTable;
