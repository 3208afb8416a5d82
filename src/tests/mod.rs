mod test_throttled_wrap;
