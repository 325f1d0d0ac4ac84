pub mod settle_sale_command;

pub use settle_sale_command::{
    PaymentInput, SaleLineInput, SaleReceipt, SaleTotals, SettleSaleCommand,
};
