mod helpers;

mod process_job_test;
