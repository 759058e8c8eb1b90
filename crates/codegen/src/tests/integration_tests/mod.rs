mod arithmetic;
mod calls;
mod control_flow;
mod creation;
mod events;
mod immutables;
mod storage;
mod strings;
