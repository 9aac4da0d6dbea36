mod helpers;

mod checkout;
mod settlement;
mod wallets;
