mod mutex_debug;
