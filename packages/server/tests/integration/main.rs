
mod concurrency;
mod get;
mod health;
mod lifecycle;
mod list;
