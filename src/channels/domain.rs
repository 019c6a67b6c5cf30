use tokio::sync::mpsc;
use crate::config::engine::{COMMAND_CHANNEL_SIZE, EVENT_CHANNEL_SIZE};
use crate::engine::domain::Request;
use crate::timer::domain::Event;


pub struct Channels {
    pub handle_to_engine: mpsc::Sender<Request>,
    pub engine_from_handle: mpsc::Receiver<Request>,

    pub timer_to_engine: mpsc::Sender<Event>,
    pub engine_from_timer: mpsc::Receiver<Event>,
}


impl Channels {
    pub fn new() -> Channels {
        let (h_to_e, e_from_h) = mpsc::channel::<Request>(COMMAND_CHANNEL_SIZE);
        let (t_to_e, e_from_t) = mpsc::channel::<Event>(EVENT_CHANNEL_SIZE);

        Self {
            handle_to_engine: h_to_e,
            engine_from_handle: e_from_h,
            timer_to_engine: t_to_e,
            engine_from_timer: e_from_t,
        }
    }
}
