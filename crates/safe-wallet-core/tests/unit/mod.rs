mod codec_test;
mod digest_test;
