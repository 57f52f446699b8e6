//! Errors raised while configuring a detector or accumulating votes.

error_chain!{
    foreign_links {
        Json(::serde_json::Error);
        Io(::std::io::Error);
    }

    errors {
        /// A grayscale image was given where a colour image is required.
        UnsupportedInputKind(channels: u8) {
            description("unsupported input image kind")
            display("images with {} channel(s) are not supported, a colour image is required",
                    channels)
        }
        /// Ratios, accumulators, feature planes or image sizes do not fit together.
        DimensionMismatch(what: String) {
            description("dimension mismatch")
            display("dimension mismatch: {}", what)
        }
        InvalidConfig(reason: String) {
            description("invalid detector configuration")
            display("invalid detector configuration: {}", reason)
        }
        InvalidForest(reason: String) {
            description("invalid hough forest")
            display("invalid hough forest: {}", reason)
        }
    }
}
