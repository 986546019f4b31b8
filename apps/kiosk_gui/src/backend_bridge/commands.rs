//! Commands queued from the UI thread to the backend worker.

pub enum BackendCommand {
    ListStations,
    SetStation { station: Option<String> },
    StartCheckin,
    SendChatMessage { text: String },
}
