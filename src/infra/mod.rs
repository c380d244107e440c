pub mod html;
pub mod http_client;
pub mod reporter;

pub use html::HtmlParser;
pub use http_client::ReqwestHttp;
pub use reporter::TracingReporter;
