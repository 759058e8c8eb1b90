mod arithmetic_ops;
mod creation_addresses;
