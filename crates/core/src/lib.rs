pub mod shared {
    pub mod config;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
}

pub mod landmarks {
    pub mod domain {
        pub mod landmark_detector;
        pub mod landmark_extractor;
        pub mod point_cloud;
    }
    pub mod infrastructure {
        pub mod recorded_landmark_detector;
    }
}

pub mod sequence {
    pub mod domain {
        pub mod sequence_normalizer;
    }
}

pub mod capture {
    pub mod domain {
        pub mod capture_state_machine;
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod ffmpeg_frame_source;
        pub mod image_sequence_frame_source;
    }
}

pub mod inference {
    pub mod domain {
        pub mod inference_dispatcher;
        pub mod model_runtime;
        pub mod npy;
        pub mod probability_vector;
        pub mod remote_transport;
        pub mod word_classifier;
    }
    pub mod infrastructure;
}

pub mod language {
    pub mod domain {
        pub mod sentence_generator;
        pub mod speech_synthesizer;
    }
    pub mod infrastructure {
        pub mod command_speech_synthesizer;
        pub mod http_sentence_generator;
    }
}

pub mod pipeline {
    pub mod session_controller;
    pub mod session_logger;
    pub mod infrastructure {
        pub mod ticked_session_runner;
    }
}
