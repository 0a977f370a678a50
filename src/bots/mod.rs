mod main_bot;

pub(crate) use main_bot::MainBot;
