use actix_web::{http::StatusCode, HttpResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoilwatchError {
    #[error("IO error\n{0}")]
    Read(#[from] std::io::Error),

    #[error("askama templating error\n{0}")]
    Askama(#[from] askama::Error),

    #[error("reqwest error\n{0}")]
    Fetch(#[from] reqwest::Error),

    #[error("csv error\n{0}")]
    Csv(#[from] csv::Error),

    #[error("serde_yaml error\n{0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("regex error\n{0}")]
    Regex(#[from] regex::Error),

    #[error("timestamp formatting error\n{0}")]
    Timestamp(#[from] time::error::Format),

    #[error("blocking task error\n{0}")]
    Blocking(#[from] actix_web::error::BlockingError),

    #[error("configuration error\n{0}")]
    Config(String),

    #[error("other error \n{0}")]
    Other(String),
}

impl actix_web::error::ResponseError for SoilwatchError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}
