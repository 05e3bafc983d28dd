pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod reviews;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use reviews::ReviewService;
