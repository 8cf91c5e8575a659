//! Storefront entities: catalog, carts, vouchers, orders and reviews.

pub mod address;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_counter;
pub mod order_item;
pub mod order_review;
pub mod product;
pub mod types;
pub mod user_voucher;
pub mod voucher;

pub use address::{Entity as Address, Model as AddressModel};
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod, PaymentStatus};
pub use order_counter::{Entity as OrderCounter, Model as OrderCounterModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_review::{Entity as OrderReview, Model as OrderReviewModel};
pub use product::{Entity as Product, Model as ProductModel, ProductStatus};
pub use types::{LocalizedText, StringList, UuidList, DEFAULT_LANGUAGE};
pub use user_voucher::{Entity as UserVoucher, Model as UserVoucherModel, UserVoucherStatus};
pub use voucher::{DiscountType, Entity as Voucher, Model as VoucherModel, VoucherWindow};
