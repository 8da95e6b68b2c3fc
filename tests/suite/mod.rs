mod gateway;
mod session;
