pub mod cart_item;
pub mod order;
pub mod order_product;
pub mod payment_method;
pub mod payment_transaction;
pub mod product;
pub mod review;
pub mod session;
pub mod store;
pub mod user;

pub use cart_item::Entity as CartItem;
pub use order::Entity as Order;
pub use order_product::Entity as OrderProduct;
pub use payment_method::Entity as PaymentMethod;
pub use payment_transaction::Entity as PaymentTransaction;
pub use product::Entity as Product;
pub use review::Entity as Review;
pub use session::Entity as Session;
pub use store::Entity as Store;
pub use user::Entity as User;

pub use cart_item::Model as CartItemModel;
pub use order::Model as OrderModel;
pub use order::OrderStatus;
pub use order_product::Model as OrderProductModel;
pub use product::Model as ProductModel;
pub use review::Model as ReviewModel;
pub use session::Model as SessionModel;
pub use store::Model as StoreModel;
pub use user::Model as UserModel;
