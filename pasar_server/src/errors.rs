use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use pasar_engine::{
    traits::{SettlementError, StorageError, WalletError},
    OrderFlowError,
    WalletApiError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Conflicting update. {0}")]
    Conflict(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::EmptyOrder |
            OrderFlowError::InvalidQuantity |
            OrderFlowError::NoPurchaser |
            OrderFlowError::InvalidPosSale => Self::InvalidRequest(e.to_string()),
            OrderFlowError::Storage(e) => e.into(),
            OrderFlowError::Settlement(e) => match e {
                SettlementError::Storage(e) => e.into(),
                SettlementError::ConcurrentModification(_) => Self::Conflict(e.to_string()),
                SettlementError::InsufficientStock { .. } |
                SettlementError::InsufficientBalance { .. } |
                SettlementError::TransitionForbidden { .. } |
                SettlementError::NotAGatewayOrder(_) |
                SettlementError::InvalidOrder(_) => Self::InvalidRequest(e.to_string()),
            },
        }
    }
}

impl From<WalletApiError> for ServerError {
    fn from(e: WalletApiError) -> Self {
        match e {
            WalletApiError::NoShopWallet(_) | WalletApiError::NoBuyerWallet(_) => Self::NoRecordFound(e.to_string()),
            WalletApiError::Storage(e) => e.into(),
            WalletApiError::Wallet(e) => match e {
                WalletError::Storage(e) => e.into(),
                WalletError::WithdrawalNotFound(_) => Self::NoRecordFound(e.to_string()),
                WalletError::AlreadyResolved(_) => Self::Conflict(e.to_string()),
                WalletError::InsufficientBalance { .. } |
                WalletError::BelowMinimum { .. } |
                WalletError::NonPositiveAmount(_) => Self::InvalidRequest(e.to_string()),
            },
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            StorageError::OrderNotFound(_) | StorageError::ShopNotFound(_) | StorageError::WalletNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
        }
    }
}
