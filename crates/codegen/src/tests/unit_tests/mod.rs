mod dispatch;
mod operations;
